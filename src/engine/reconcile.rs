//! Broker-closure reconciliation.
//!
//! Brokers force-close intraday positions at square-off; those fills never
//! pass through the engine. The sync scans broker order history for a
//! completed opposite-side order matching each open position's absolute
//! quantity, books the realized P&L, and retires the stale position. Order
//! ids make the whole pass idempotent.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, FixedOffset, NaiveTime, Utc};
use tracing::{error, info, warn};

use crate::domain::error::EngineError;
use crate::domain::lifecycle::close_outcome;
use crate::domain::market::MarketSpec;
use crate::domain::position::{Position, Trade, TradeStatus};
use crate::ports::execution::{HistoricalOrder, OrderExecutionPort};
use crate::ports::store::PositionStore;

const QUANTITY_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileOutcome {
    /// Positions closed with a fresh broker-initiated trade.
    pub closed: usize,
    /// Positions whose closing order was already in the ledger; only the
    /// stale position row was removed.
    pub skipped_duplicates: usize,
    /// Positions with no matching closure; presumed still live.
    pub left_open: usize,
}

/// One reconciliation pass over every open position in the market's scope.
pub async fn reconcile(
    spec: &MarketSpec,
    store: &dyn PositionStore,
    execution: &dyn OrderExecutionPort,
) -> Result<ReconcileOutcome, EngineError> {
    let history = execution.get_order_history().await?;
    let open = store.open_positions(spec.scope())?;

    let mut outcome = ReconcileOutcome::default();
    for position in &open {
        match find_closure(position, &history) {
            None => {
                outcome.left_open += 1;
                info!(
                    instrument = position.key.instrument,
                    "no closing order found, position presumed live"
                );
            }
            Some(order) => {
                if store.find_trade_by_order_id(&order.order_id)?.is_some() {
                    // Already absorbed by a previous pass.
                    store.delete_position(&position.key)?;
                    outcome.skipped_duplicates += 1;
                    continue;
                }
                absorb_closure(store, position, order)?;
                outcome.closed += 1;
            }
        }
    }

    info!(
        closed = outcome.closed,
        skipped = outcome.skipped_duplicates,
        left_open = outcome.left_open,
        "reconciliation pass complete"
    );
    Ok(outcome)
}

/// A completed order on the same instrument, opposite side, matching
/// absolute quantity.
fn find_closure<'a>(
    position: &Position,
    history: &'a [HistoricalOrder],
) -> Option<&'a HistoricalOrder> {
    let closing_side = if position.is_short() {
        crate::domain::position::Side::Buy
    } else {
        crate::domain::position::Side::Sell
    };
    history.iter().find(|order| {
        order.completed
            && order.instrument == position.key.instrument
            && order.side == closing_side
            && (order.quantity - position.quantity.abs()).abs() < QUANTITY_EPSILON
    })
}

fn absorb_closure(
    store: &dyn PositionStore,
    position: &Position,
    order: &HistoricalOrder,
) -> Result<(), EngineError> {
    let outcome = close_outcome(position, order.price);
    let now = Utc::now();
    store.insert_trade(&Trade {
        id: None,
        key: position.key.clone(),
        side: order.side,
        quantity: position.quantity.abs(),
        entry_price: position.entry_price,
        exit_price: Some(order.price),
        status: TradeStatus::Closed,
        realized_pl: Some(outcome.realized_pl),
        realized_pl_pct: Some(outcome.realized_pl_pct),
        confidence: 0.0,
        reasoning: "broker square-off".to_string(),
        order_id: order.order_id.clone(),
        broker_initiated: true,
        created_at: now,
        closed_at: Some(order.executed_at),
    })?;
    store.delete_position(&position.key)?;

    let mut metrics = store.get_metrics(position.key.scope)?;
    metrics.record_close(outcome.realized_pl, now);
    store.put_metrics(position.key.scope, &metrics)?;

    info!(
        instrument = position.key.instrument,
        order_id = order.order_id,
        realized_pl = outcome.realized_pl,
        "absorbed broker-initiated closure"
    );
    Ok(())
}

/// Next occurrence of `cutoff` (exchange-local time at `utc_offset_minutes`)
/// strictly after `now`, as a UTC instant.
pub fn next_cutoff(
    now: DateTime<Utc>,
    cutoff: NaiveTime,
    utc_offset_minutes: i32,
) -> Option<DateTime<Utc>> {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60)?;
    let local_now = now.with_timezone(&offset);
    let mut candidate = local_now.date_naive().and_time(cutoff);
    if local_now.naive_local() >= candidate {
        candidate = candidate.checked_add_days(Days::new(1))?;
    }
    candidate
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Daily schedule: catch-up run on start when today's cutoff has already
/// passed on a trading day, then one pass per trading day at the cutoff.
/// Runs until the owning task is aborted.
pub async fn run_schedule(
    spec: MarketSpec,
    cutoff: NaiveTime,
    utc_offset_minutes: i32,
    store: Arc<dyn PositionStore>,
    execution: Arc<dyn OrderExecutionPort>,
) {
    let now = Utc::now();
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60);
    let past_cutoff = offset
        .map(|off| now.with_timezone(&off).time() >= cutoff)
        .unwrap_or(false);
    if past_cutoff && spec.is_trading_day(now) {
        run_once(&spec, store.as_ref(), execution.as_ref()).await;
    }

    loop {
        let now = Utc::now();
        let Some(next) = next_cutoff(now, cutoff, utc_offset_minutes) else {
            error!("invalid reconciliation cutoff, scheduler stopping");
            return;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;

        let fired_at = Utc::now();
        if spec.is_trading_day(fired_at) {
            run_once(&spec, store.as_ref(), execution.as_ref()).await;
        }
    }
}

async fn run_once(spec: &MarketSpec, store: &dyn PositionStore, execution: &dyn OrderExecutionPort) {
    if let Err(e) = reconcile(spec, store, execution).await {
        warn!(error = %e, "reconciliation pass failed, will retry next cycle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::IST_OFFSET_MINUTES;
    use chrono::TimeZone;

    #[test]
    fn next_cutoff_today_when_before() {
        // 2024-06-03 05:00 UTC = 10:30 IST, before a 15:35 IST cutoff.
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 5, 0, 0).unwrap();
        let cutoff = NaiveTime::from_hms_opt(15, 35, 0).unwrap();
        let next = next_cutoff(now, cutoff, IST_OFFSET_MINUTES).unwrap();
        // 15:35 IST = 10:05 UTC same day.
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 3, 10, 5, 0).unwrap());
    }

    #[test]
    fn next_cutoff_rolls_to_tomorrow_when_past() {
        // 11:00 UTC = 16:30 IST, past the cutoff.
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 11, 0, 0).unwrap();
        let cutoff = NaiveTime::from_hms_opt(15, 35, 0).unwrap();
        let next = next_cutoff(now, cutoff, IST_OFFSET_MINUTES).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 4, 10, 5, 0).unwrap());
    }

    #[test]
    fn next_cutoff_is_always_in_the_future() {
        let cutoff = NaiveTime::from_hms_opt(15, 35, 0).unwrap();
        // Exactly at the cutoff instant.
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 5, 0).unwrap();
        let next = next_cutoff(now, cutoff, IST_OFFSET_MINUTES).unwrap();
        assert!(next > now);
    }
}
