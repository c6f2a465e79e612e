//! Position, trade and metrics persistence port.
//!
//! Synchronous on purpose: store access is local and never a suspension
//! point. The store must enforce one live position per key and unique
//! trade order ids; adapters do this at the schema level.

use crate::domain::error::EngineError;
use crate::domain::metrics::BotMetrics;
use crate::domain::position::{Position, PositionKey, Scope, Trade};

pub trait PositionStore: Send + Sync {
    fn get_position(&self, key: &PositionKey) -> Result<Option<Position>, EngineError>;

    fn open_positions(&self, scope: Scope) -> Result<Vec<Position>, EngineError>;

    /// Insert or replace the one live position for `position.key`.
    fn upsert_position(&self, position: &Position) -> Result<(), EngineError>;

    fn delete_position(&self, key: &PositionKey) -> Result<(), EngineError>;

    /// Append a ledger row; returns the assigned row id. Fails on a
    /// duplicate order id.
    fn insert_trade(&self, trade: &Trade) -> Result<i64, EngineError>;

    fn find_trade_by_order_id(&self, order_id: &str) -> Result<Option<Trade>, EngineError>;

    /// Last `limit` trades for one instrument, newest first.
    fn recent_trades(&self, key: &PositionKey, limit: usize) -> Result<Vec<Trade>, EngineError>;

    /// Metrics row for the scope; an empty aggregate if none exists yet.
    fn get_metrics(&self, scope: Scope) -> Result<BotMetrics, EngineError>;

    fn put_metrics(&self, scope: Scope, metrics: &BotMetrics) -> Result<(), EngineError>;
}
