//! Order execution port: market orders and broker order history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::error::EngineError;
use crate::domain::position::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Completed,
    Pending,
    Rejected,
}

/// Venue report for a placed market order. `filled_price` may be absent on
/// venues that only confirm asynchronously; callers fall back to the quote.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFill {
    pub order_id: String,
    pub filled_quantity: f64,
    pub filled_price: Option<f64>,
    pub status: OrderStatus,
}

/// A past order from the broker's own books, used to detect closures the
/// engine did not initiate.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalOrder {
    pub order_id: String,
    pub instrument: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub completed: bool,
    pub executed_at: DateTime<Utc>,
}

#[async_trait]
pub trait OrderExecutionPort: Send + Sync {
    async fn place_market_order(
        &self,
        instrument: &str,
        side: Side,
        quantity: f64,
    ) -> Result<OrderFill, EngineError>;

    /// Recent order history for the venue, newest first.
    async fn get_order_history(&self) -> Result<Vec<HistoricalOrder>, EngineError>;
}
