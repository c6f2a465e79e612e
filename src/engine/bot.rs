//! Per-market trading loop.
//!
//! One cooperative task iterates the market's instruments sequentially each
//! cycle, sleeping a fixed interval between cycles. Cancellation is a run
//! flag checked at cycle boundaries; a cycle in flight finishes. A second
//! task runs the daily reconciliation schedule where the market has a
//! square-off.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::config::{EngineConfig, MarketConfig};
use crate::domain::error::EngineError;
use crate::domain::market::MarketSpec;
use crate::domain::metrics::BotMetrics;
use crate::domain::position::{Position, Side};
use crate::engine::executor::{DecisionExecutor, InstrumentOutcome};
use crate::engine::reconcile;
use crate::ports::execution::OrderExecutionPort;
use crate::ports::market_data::MarketDataPort;
use crate::ports::oracle::OraclePort;
use crate::ports::store::PositionStore;

/// Sync runs this long after the broker square-off, giving fills time to
/// appear in order history.
const SYNC_DELAY_MINUTES: i64 = 15;

#[derive(Debug, Clone, Serialize)]
pub struct MarketStatus {
    pub running: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub positions: Vec<Position>,
    pub daily_trade_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    pub positions: Vec<Position>,
    pub invested_value: f64,
    pub unrealized_pl: f64,
    pub metrics: BotMetrics,
}

struct Inner {
    executor: DecisionExecutor,
    store: Arc<dyn PositionStore>,
    execution: Arc<dyn OrderExecutionPort>,
    spec: MarketSpec,
    instruments: Vec<String>,
    check_interval: Duration,
    max_daily_trades: u32,
    running: AtomicBool,
    daily_trades: AtomicU32,
    last_check: Mutex<Option<DateTime<Utc>>>,
}

/// One market's engine handle: the loop, the sync schedule, and the query
/// surface a control layer consumes.
pub struct MarketEngine {
    inner: Arc<Inner>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl MarketEngine {
    pub fn new(
        config: &EngineConfig,
        market: MarketConfig,
        market_data: Arc<dyn MarketDataPort>,
        execution: Arc<dyn OrderExecutionPort>,
        oracle: Arc<dyn OraclePort>,
        store: Arc<dyn PositionStore>,
    ) -> MarketEngine {
        let spec = market.spec.clone();
        let instruments = market.instruments.clone();
        let executor = DecisionExecutor::new(
            market_data,
            Arc::clone(&execution),
            oracle,
            Arc::clone(&store),
            market,
            config.indicators,
            config.risk,
            config.confidence_threshold,
        );
        MarketEngine {
            inner: Arc::new(Inner {
                executor,
                store,
                execution,
                spec,
                instruments,
                check_interval: Duration::from_secs(config.check_interval_secs),
                max_daily_trades: config.max_daily_trades,
                running: AtomicBool::new(false),
                daily_trades: AtomicU32::new(0),
                last_check: Mutex::new(None),
            }),
            loop_task: Mutex::new(None),
            sync_task: Mutex::new(None),
        }
    }

    /// Start the trading loop and, where the market has a square-off, the
    /// daily reconciliation schedule. Idempotent while running.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.resync()?;

        let loop_inner = Arc::clone(&self.inner);
        let mut loop_slot = self
            .loop_task
            .lock()
            .map_err(|_| EngineError::Store("engine task registry poisoned".to_string()))?;
        *loop_slot = Some(tokio::spawn(async move {
            run_loop(loop_inner).await;
        }));
        drop(loop_slot);

        if let Some(square_off) = self.inner.spec.square_off {
            let cutoff = square_off
                .overflowing_add_signed(chrono::Duration::minutes(SYNC_DELAY_MINUTES))
                .0;
            let offset = self
                .inner
                .spec
                .session
                .map(|w| w.utc_offset_minutes)
                .unwrap_or(0);
            let spec = self.inner.spec.clone();
            let store = Arc::clone(&self.inner.store);
            let execution = Arc::clone(&self.inner.execution);
            let mut sync_slot = self
                .sync_task
                .lock()
                .map_err(|_| EngineError::Store("engine task registry poisoned".to_string()))?;
            *sync_slot = Some(tokio::spawn(async move {
                reconcile::run_schedule(spec, cutoff, offset, store, execution).await;
            }));
        }

        info!(market = %self.inner.spec.kind, "engine started");
        Ok(())
    }

    /// Flip the run flag and cancel the reconciliation schedule. The loop
    /// task is never aborted: a cycle already in flight finishes its store
    /// writes, and the task exits at the next cycle boundary.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        if let Ok(mut sync) = self.sync_task.lock() {
            if let Some(task) = sync.take() {
                task.abort();
            }
        }
        if let Ok(mut lp) = self.loop_task.lock() {
            // Detached; the run flag drains it.
            lp.take();
        }
        info!(market = %self.inner.spec.kind, "engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> Result<MarketStatus, EngineError> {
        let positions = self.inner.store.open_positions(self.inner.spec.scope())?;
        let last_check = self
            .inner
            .last_check
            .lock()
            .map(|guard| *guard)
            .unwrap_or(None);
        Ok(MarketStatus {
            running: self.is_running(),
            last_check,
            positions,
            daily_trade_count: self.inner.daily_trades.load(Ordering::SeqCst),
        })
    }

    pub fn portfolio(&self) -> Result<PortfolioReport, EngineError> {
        let positions = self.inner.store.open_positions(self.inner.spec.scope())?;
        let invested_value = positions.iter().map(Position::exposure).sum();
        let unrealized_pl = positions.iter().map(|p| p.unrealized_pl).sum();
        let metrics = self.inner.store.get_metrics(self.inner.spec.scope())?;
        Ok(PortfolioReport {
            positions,
            invested_value,
            unrealized_pl,
            metrics,
        })
    }

    /// Operator-initiated trade through the normal lifecycle and risk path.
    pub async fn execute_manual_trade(
        &self,
        instrument: &str,
        side: Side,
        quantity: Option<f64>,
    ) -> Result<InstrumentOutcome, EngineError> {
        self.inner
            .executor
            .execute_manual_trade(instrument, side, quantity)
            .await
    }

    /// Read persisted positions back so the first cycle starts from stored
    /// state, and surface them in the log.
    fn resync(&self) -> Result<(), EngineError> {
        let positions = self.inner.store.open_positions(self.inner.spec.scope())?;
        for position in &positions {
            info!(
                instrument = position.key.instrument,
                quantity = position.quantity,
                entry_price = position.entry_price,
                "resynced open position"
            );
        }
        info!(
            market = %self.inner.spec.kind,
            open_positions = positions.len(),
            "position resync complete"
        );
        Ok(())
    }
}

async fn run_loop(inner: Arc<Inner>) {
    let mut counter_date: Option<NaiveDate> = None;

    while inner.running.load(Ordering::SeqCst) {
        let now = Utc::now();

        // Daily trade counter resets on UTC date change.
        let today = now.date_naive();
        if counter_date != Some(today) {
            counter_date = Some(today);
            inner.daily_trades.store(0, Ordering::SeqCst);
        }

        if !inner.spec.in_session(now) {
            tokio::time::sleep(inner.check_interval).await;
            continue;
        }

        if inner.daily_trades.load(Ordering::SeqCst) >= inner.max_daily_trades {
            warn!(
                market = %inner.spec.kind,
                limit = inner.max_daily_trades,
                "daily trade limit reached, skipping cycle"
            );
            tokio::time::sleep(inner.check_interval).await;
            continue;
        }

        for instrument in &inner.instruments {
            match inner.executor.process_instrument(instrument).await {
                Ok(InstrumentOutcome::Traded { orders }) => {
                    inner.daily_trades.fetch_add(1, Ordering::SeqCst);
                    info!(instrument, orders, "instrument cycle traded");
                }
                Ok(InstrumentOutcome::Blocked { reason }) => {
                    info!(instrument, reason, "instrument cycle blocked");
                }
                Ok(InstrumentOutcome::Held) => {}
                // Per-instrument failures never abort the cycle.
                Err(e) => {
                    error!(instrument, error = %e, "instrument cycle failed");
                }
            }
        }

        if let Ok(mut last_check) = inner.last_check.lock() {
            *last_check = Some(now);
        }

        tokio::time::sleep(inner.check_interval).await;
    }
}
