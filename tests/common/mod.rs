//! Mock ports and fixtures shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use tradepilot::adapters::sqlite_store::SqliteStore;
use tradepilot::domain::candle::{Candle, Timeframe};
use tradepilot::domain::config::{EngineConfig, MarketConfig};
use tradepilot::domain::error::EngineError;
use tradepilot::domain::indicator::IndicatorParams;
use tradepilot::domain::market::MarketSpec;
use tradepilot::domain::metrics::BotMetrics;
use tradepilot::domain::position::{Position, PositionKey, Scope, Side, Trade};
use tradepilot::domain::risk::RiskLimits;
use tradepilot::ports::store::PositionStore;
use tradepilot::ports::execution::{
    HistoricalOrder, OrderExecutionPort, OrderFill, OrderStatus,
};
use tradepilot::ports::market_data::MarketDataPort;
use tradepilot::ports::oracle::{Decision, DecisionRequest, OraclePort};

/// Serves a gently rising series ending at `price` for every timeframe, so
/// snapshots are always ready and quotes are deterministic.
pub struct MockMarketData {
    pub price: f64,
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn get_candles(
        &self,
        _instrument: &str,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError> {
        let n = limit.min(60);
        Ok((0..n)
            .map(|i| {
                let close = self.price - (n - 1 - i) as f64 * 0.5;
                Candle {
                    timestamp: i as i64 * 300_000,
                    open: close,
                    high: close * 1.01,
                    low: close * 0.99,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect())
    }

    async fn get_price(&self, _instrument: &str) -> Result<f64, EngineError> {
        Ok(self.price)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub instrument: String,
    pub side: Side,
    pub quantity: f64,
}

/// Records every order; fills at the requested quantity with no price
/// report, so callers exercise the quote fallback.
pub struct MockExecution {
    pub orders: Mutex<Vec<PlacedOrder>>,
    pub history: Vec<HistoricalOrder>,
    counter: AtomicU64,
}

impl MockExecution {
    pub fn new() -> MockExecution {
        MockExecution {
            orders: Mutex::new(Vec::new()),
            history: Vec::new(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn with_history(history: Vec<HistoricalOrder>) -> MockExecution {
        MockExecution {
            orders: Mutex::new(Vec::new()),
            history,
            counter: AtomicU64::new(0),
        }
    }

    pub fn placed(&self) -> Vec<PlacedOrder> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderExecutionPort for MockExecution {
    async fn place_market_order(
        &self,
        instrument: &str,
        side: Side,
        quantity: f64,
    ) -> Result<OrderFill, EngineError> {
        self.orders.lock().unwrap().push(PlacedOrder {
            instrument: instrument.to_string(),
            side,
            quantity,
        });
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(OrderFill {
            order_id: format!("mock-{id}"),
            filled_quantity: quantity,
            filled_price: None,
            status: OrderStatus::Completed,
        })
    }

    async fn get_order_history(&self) -> Result<Vec<HistoricalOrder>, EngineError> {
        Ok(self.history.clone())
    }
}

pub enum OracleBehavior {
    Fixed(Decision),
    Fail,
}

pub struct MockOracle {
    pub behavior: OracleBehavior,
}

impl MockOracle {
    pub fn fixed(decision: Decision) -> MockOracle {
        MockOracle {
            behavior: OracleBehavior::Fixed(decision),
        }
    }

    pub fn failing() -> MockOracle {
        MockOracle {
            behavior: OracleBehavior::Fail,
        }
    }
}

#[async_trait]
impl OraclePort for MockOracle {
    async fn decide(&self, _request: &DecisionRequest) -> Result<Decision, EngineError> {
        match &self.behavior {
            OracleBehavior::Fixed(decision) => Ok(decision.clone()),
            OracleBehavior::Fail => Err(EngineError::Oracle("connection refused".to_string())),
        }
    }
}

/// In-memory store whose open-position listing can be switched to fail,
/// for exercising degraded risk reads. Every other method delegates.
pub struct FlakyStore {
    inner: SqliteStore,
    fail_open_positions: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Result<FlakyStore, EngineError> {
        Ok(FlakyStore {
            inner: SqliteStore::in_memory()?,
            fail_open_positions: AtomicBool::new(false),
        })
    }

    pub fn set_fail_open_positions(&self, fail: bool) {
        self.fail_open_positions.store(fail, Ordering::SeqCst);
    }
}

impl PositionStore for FlakyStore {
    fn get_position(&self, key: &PositionKey) -> Result<Option<Position>, EngineError> {
        self.inner.get_position(key)
    }

    fn open_positions(&self, scope: Scope) -> Result<Vec<Position>, EngineError> {
        if self.fail_open_positions.load(Ordering::SeqCst) {
            return Err(EngineError::Store("disk I/O error".to_string()));
        }
        self.inner.open_positions(scope)
    }

    fn upsert_position(&self, position: &Position) -> Result<(), EngineError> {
        self.inner.upsert_position(position)
    }

    fn delete_position(&self, key: &PositionKey) -> Result<(), EngineError> {
        self.inner.delete_position(key)
    }

    fn insert_trade(&self, trade: &Trade) -> Result<i64, EngineError> {
        self.inner.insert_trade(trade)
    }

    fn find_trade_by_order_id(&self, order_id: &str) -> Result<Option<Trade>, EngineError> {
        self.inner.find_trade_by_order_id(order_id)
    }

    fn recent_trades(&self, key: &PositionKey, limit: usize) -> Result<Vec<Trade>, EngineError> {
        self.inner.recent_trades(key, limit)
    }

    fn get_metrics(&self, scope: Scope) -> Result<BotMetrics, EngineError> {
        self.inner.get_metrics(scope)
    }

    fn put_metrics(&self, scope: Scope, metrics: &BotMetrics) -> Result<(), EngineError> {
        self.inner.put_metrics(scope, metrics)
    }
}

pub fn crypto_market(instrument: &str, trade_amount: f64) -> MarketConfig {
    MarketConfig {
        spec: MarketSpec::crypto(true),
        instruments: vec![instrument.to_string()],
        trade_amount,
    }
}

pub fn equity_market(instrument: &str, trade_amount: f64) -> MarketConfig {
    MarketConfig {
        spec: MarketSpec::equity_intraday(true),
        instruments: vec![instrument.to_string()],
        trade_amount,
    }
}

pub fn engine_config(market: MarketConfig) -> EngineConfig {
    EngineConfig {
        check_interval_secs: 300,
        confidence_threshold: 0.6,
        max_daily_trades: 10,
        indicators: IndicatorParams::default(),
        risk: RiskLimits {
            max_open_positions: 3,
            max_position_value: 10_000.0,
            max_portfolio_exposure: 25_000.0,
        },
        markets: vec![market],
        store_path: ":memory:".to_string(),
    }
}

pub fn seeded_position(spec: &MarketSpec, instrument: &str, quantity: f64, entry: f64) -> Position {
    Position {
        key: PositionKey::new(instrument, spec.scope()),
        quantity,
        entry_price: entry,
        current_price: entry,
        unrealized_pl: 0.0,
        updated_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}
