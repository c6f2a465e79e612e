//! Market data port: candle history and spot quotes.

use async_trait::async_trait;

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::error::EngineError;

#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Most recent `limit` candles, ascending by timestamp.
    async fn get_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError>;

    async fn get_price(&self, instrument: &str) -> Result<f64, EngineError>;
}
