//! End-to-end decision cycles through mock ports and the real SQLite store.

mod common;

use std::sync::Arc;

use approx::assert_relative_eq;

use common::{
    crypto_market, equity_market, FlakyStore, MockExecution, MockMarketData, MockOracle,
    seeded_position,
};
use tradepilot::adapters::sqlite_store::SqliteStore;
use tradepilot::domain::config::MarketConfig;
use tradepilot::domain::indicator::IndicatorParams;
use tradepilot::domain::lifecycle::Action;
use tradepilot::domain::position::{PositionKey, Side, TradeStatus};
use tradepilot::domain::risk::RiskLimits;
use tradepilot::engine::executor::{DecisionExecutor, InstrumentOutcome};
use tradepilot::ports::oracle::Decision;
use tradepilot::ports::store::PositionStore;

fn decision(action: Action, confidence: f64) -> Decision {
    Decision {
        action,
        confidence,
        reasoning: "test".to_string(),
    }
}

fn limits() -> RiskLimits {
    RiskLimits {
        max_open_positions: 3,
        max_position_value: 10_000.0,
        max_portfolio_exposure: 25_000.0,
    }
}

struct Harness {
    executor: DecisionExecutor,
    execution: Arc<MockExecution>,
    store: Arc<SqliteStore>,
}

fn harness(
    market: MarketConfig,
    price: f64,
    oracle: MockOracle,
    execution: MockExecution,
) -> Harness {
    let execution = Arc::new(execution);
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let executor = DecisionExecutor::new(
        Arc::new(MockMarketData { price }),
        execution.clone(),
        Arc::new(oracle),
        store.clone(),
        market,
        IndicatorParams::default(),
        limits(),
        0.6,
    );
    Harness {
        executor,
        execution,
        store,
    }
}

#[tokio::test]
async fn flat_buy_opens_long_with_open_trade() {
    let market = crypto_market("BTCUSDT", 100.0);
    let spec = market.spec.clone();
    let h = harness(
        market,
        100.0,
        MockOracle::fixed(decision(Action::Buy, 0.8)),
        MockExecution::new(),
    );

    let outcome = h.executor.process_instrument("BTCUSDT").await.unwrap();
    assert_eq!(outcome, InstrumentOutcome::Traded { orders: 1 });

    let key = PositionKey::new("BTCUSDT", spec.scope());
    let position = h.store.get_position(&key).unwrap().unwrap();
    assert_relative_eq!(position.quantity, 1.0); // 100 / 100
    assert_relative_eq!(position.entry_price, 100.0);

    let trades = h.store.recent_trades(&key, 10).unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].status, TradeStatus::Open);
    assert_eq!(trades[0].side, Side::Buy);
    assert_relative_eq!(trades[0].confidence, 0.8);
}

#[tokio::test]
async fn long_sell_closes_with_pl_and_metrics() {
    let market = crypto_market("BTCUSDT", 100.0);
    let spec = market.spec.clone();
    let h = harness(
        market,
        110.0,
        MockOracle::fixed(decision(Action::Sell, 0.9)),
        MockExecution::new(),
    );
    h.store
        .upsert_position(&seeded_position(&spec, "BTCUSDT", 1.0, 100.0))
        .unwrap();

    let outcome = h.executor.process_instrument("BTCUSDT").await.unwrap();
    // Spot crypto cannot flip short, so SELL-while-LONG is a single close.
    assert_eq!(outcome, InstrumentOutcome::Traded { orders: 1 });

    let key = PositionKey::new("BTCUSDT", spec.scope());
    assert!(h.store.get_position(&key).unwrap().is_none());

    let trades = h.store.recent_trades(&key, 10).unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].status, TradeStatus::Closed);
    assert_relative_eq!(trades[0].realized_pl.unwrap(), 10.0);
    assert_relative_eq!(trades[0].exit_price.unwrap(), 110.0);

    let metrics = h.store.get_metrics(spec.scope()).unwrap();
    assert_eq!(metrics.total_trades, 1);
    assert_eq!(metrics.winning_trades, 1);
    assert_relative_eq!(metrics.total_realized_pl, 10.0);
}

#[tokio::test]
async fn buy_while_long_averages_entry() {
    let market = crypto_market("BTCUSDT", 120.0);
    let spec = market.spec.clone();
    let h = harness(
        market,
        120.0,
        MockOracle::fixed(decision(Action::Buy, 0.8)),
        MockExecution::new(),
    );
    h.store
        .upsert_position(&seeded_position(&spec, "BTCUSDT", 1.0, 100.0))
        .unwrap();

    let outcome = h.executor.process_instrument("BTCUSDT").await.unwrap();
    assert_eq!(outcome, InstrumentOutcome::Traded { orders: 1 });

    // Added quantity = 120 notional / 120 quote = 1.0.
    let key = PositionKey::new("BTCUSDT", spec.scope());
    let position = h.store.get_position(&key).unwrap().unwrap();
    assert_relative_eq!(position.quantity, 2.0, epsilon = 1e-6);
    assert_relative_eq!(
        position.entry_price,
        (1.0 * 100.0 + 1.0 * 120.0) / 2.0,
        epsilon = 1e-6
    );
}

#[tokio::test]
async fn confidence_below_threshold_places_no_order() {
    let market = crypto_market("BTCUSDT", 100.0);
    let h = harness(
        market,
        100.0,
        MockOracle::fixed(decision(Action::Buy, 0.4)),
        MockExecution::new(),
    );

    let outcome = h.executor.process_instrument("BTCUSDT").await.unwrap();
    assert_eq!(outcome, InstrumentOutcome::Held);
    assert!(h.execution.placed().is_empty());
}

#[tokio::test]
async fn fourth_position_blocked_without_execution() {
    let market = crypto_market("DOGEUSDT", 100.0);
    let spec = market.spec.clone();
    let h = harness(
        market,
        100.0,
        MockOracle::fixed(decision(Action::Buy, 0.9)),
        MockExecution::new(),
    );
    for instrument in ["BTCUSDT", "ETHUSDT", "SOLUSDT"] {
        h.store
            .upsert_position(&seeded_position(&spec, instrument, 1.0, 100.0))
            .unwrap();
    }

    let outcome = h.executor.process_instrument("DOGEUSDT").await.unwrap();
    assert!(matches!(outcome, InstrumentOutcome::Blocked { .. }));
    assert!(h.execution.placed().is_empty());
}

#[tokio::test]
async fn sell_while_flat_on_spot_market_is_a_noop() {
    let market = crypto_market("BTCUSDT", 100.0);
    let h = harness(
        market,
        100.0,
        MockOracle::fixed(decision(Action::Sell, 0.9)),
        MockExecution::new(),
    );

    let outcome = h.executor.process_instrument("BTCUSDT").await.unwrap();
    assert_eq!(outcome, InstrumentOutcome::Held);
    assert!(h.execution.placed().is_empty());
}

#[tokio::test]
async fn oracle_failure_degrades_to_hold() {
    let market = crypto_market("BTCUSDT", 100.0);
    let h = harness(market, 100.0, MockOracle::failing(), MockExecution::new());

    let outcome = h.executor.process_instrument("BTCUSDT").await.unwrap();
    assert_eq!(outcome, InstrumentOutcome::Held);
    assert!(h.execution.placed().is_empty());
}

#[tokio::test]
async fn sell_while_long_flips_short_on_equity() {
    let market = equity_market("RELIANCE", 1_000.0);
    let spec = market.spec.clone();
    let h = harness(
        market,
        100.0,
        MockOracle::fixed(decision(Action::Sell, 0.9)),
        MockExecution::new(),
    );
    h.store
        .upsert_position(&seeded_position(&spec, "RELIANCE", 5.0, 90.0))
        .unwrap();

    let outcome = h.executor.process_instrument("RELIANCE").await.unwrap();
    assert_eq!(outcome, InstrumentOutcome::Traded { orders: 2 });

    let placed = h.execution.placed();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[0].side, Side::Sell);
    assert_relative_eq!(placed[0].quantity, 5.0); // close the long first
    assert_eq!(placed[1].side, Side::Sell);
    assert_relative_eq!(placed[1].quantity, 10.0); // 1000 / 100, whole shares

    let key = PositionKey::new("RELIANCE", spec.scope());
    let position = h.store.get_position(&key).unwrap().unwrap();
    assert_relative_eq!(position.quantity, -10.0);

    let metrics = h.store.get_metrics(spec.scope()).unwrap();
    assert_eq!(metrics.total_trades, 1);
    assert_relative_eq!(metrics.total_realized_pl, (100.0 - 90.0) * 5.0);
}

#[tokio::test]
async fn buy_while_short_covers_only() {
    let market = equity_market("RELIANCE", 1_000.0);
    let spec = market.spec.clone();
    let h = harness(
        market,
        95.0,
        MockOracle::fixed(decision(Action::Buy, 0.9)),
        MockExecution::new(),
    );
    h.store
        .upsert_position(&seeded_position(&spec, "RELIANCE", -10.0, 100.0))
        .unwrap();

    let outcome = h.executor.process_instrument("RELIANCE").await.unwrap();
    assert_eq!(outcome, InstrumentOutcome::Traded { orders: 1 });

    let key = PositionKey::new("RELIANCE", spec.scope());
    assert!(h.store.get_position(&key).unwrap().is_none());

    let trades = h.store.recent_trades(&key, 10).unwrap();
    assert_eq!(trades[0].status, TradeStatus::Closed);
    assert_relative_eq!(trades[0].realized_pl.unwrap(), (100.0 - 95.0) * 10.0);
}

#[tokio::test]
async fn manual_trade_skips_oracle_but_not_risk() {
    // Oracle would fail if consulted; the manual path never asks it.
    let market = crypto_market("BTCUSDT", 100.0);
    let spec = market.spec.clone();
    let h = harness(market, 100.0, MockOracle::failing(), MockExecution::new());

    let outcome = h
        .executor
        .execute_manual_trade("BTCUSDT", Side::Buy, Some(0.25))
        .await
        .unwrap();
    assert_eq!(outcome, InstrumentOutcome::Traded { orders: 1 });

    let key = PositionKey::new("BTCUSDT", spec.scope());
    let position = h.store.get_position(&key).unwrap().unwrap();
    assert_relative_eq!(position.quantity, 0.25);

    // With the book full, the same manual entry is blocked.
    for instrument in ["ETHUSDT", "SOLUSDT"] {
        h.store
            .upsert_position(&seeded_position(&spec, instrument, 1.0, 100.0))
            .unwrap();
    }
    let blocked = h
        .executor
        .execute_manual_trade("ADAUSDT", Side::Buy, None)
        .await
        .unwrap();
    assert!(matches!(blocked, InstrumentOutcome::Blocked { .. }));
}

#[tokio::test]
async fn manual_quantity_counts_toward_value_ceiling() {
    // 200 units at quote 100 is 20_000 notional, over the 10_000
    // per-instrument ceiling even though trade_amount alone is tiny.
    let market = crypto_market("BTCUSDT", 100.0);
    let h = harness(market, 100.0, MockOracle::failing(), MockExecution::new());

    let blocked = h
        .executor
        .execute_manual_trade("BTCUSDT", Side::Buy, Some(200.0))
        .await
        .unwrap();
    assert!(matches!(blocked, InstrumentOutcome::Blocked { .. }));
    assert!(h.execution.placed().is_empty());

    // Same override at a tenth of the size passes.
    let allowed = h
        .executor
        .execute_manual_trade("BTCUSDT", Side::Buy, Some(20.0))
        .await
        .unwrap();
    assert_eq!(allowed, InstrumentOutcome::Traded { orders: 1 });
}

#[tokio::test]
async fn flip_at_slot_ceiling_still_closes_and_reverses() {
    let market = equity_market("RELIANCE", 1_000.0);
    let spec = market.spec.clone();
    let h = harness(
        market,
        100.0,
        MockOracle::fixed(decision(Action::Sell, 0.9)),
        MockExecution::new(),
    );
    h.store
        .upsert_position(&seeded_position(&spec, "RELIANCE", 5.0, 90.0))
        .unwrap();
    for instrument in ["TCS", "INFY"] {
        h.store
            .upsert_position(&seeded_position(&spec, instrument, 1.0, 100.0))
            .unwrap();
    }

    // Book is at max_open_positions, but the flip frees RELIANCE's slot
    // before the short opens, so the plan runs end to end.
    let outcome = h.executor.process_instrument("RELIANCE").await.unwrap();
    assert_eq!(outcome, InstrumentOutcome::Traded { orders: 2 });

    let key = PositionKey::new("RELIANCE", spec.scope());
    let position = h.store.get_position(&key).unwrap().unwrap();
    assert_relative_eq!(position.quantity, -10.0);
    assert_eq!(h.store.open_positions(spec.scope()).unwrap().len(), 3);
}

#[tokio::test]
async fn risk_check_fails_open_when_store_read_errors() {
    let market = crypto_market("BTCUSDT", 100.0);
    let spec = market.spec.clone();
    let store = Arc::new(FlakyStore::new().unwrap());
    let execution = Arc::new(MockExecution::new());
    let executor = DecisionExecutor::new(
        Arc::new(MockMarketData { price: 100.0 }),
        execution.clone(),
        Arc::new(MockOracle::failing()),
        store.clone(),
        market,
        IndicatorParams::default(),
        limits(),
        0.6,
    );

    store.set_fail_open_positions(true);
    let outcome = executor
        .execute_manual_trade("BTCUSDT", Side::Buy, None)
        .await
        .unwrap();
    // The unreadable book degrades to Allowed rather than refusing trades.
    assert_eq!(outcome, InstrumentOutcome::Traded { orders: 1 });
    assert_eq!(execution.placed().len(), 1);

    let key = PositionKey::new("BTCUSDT", spec.scope());
    let position = store.get_position(&key).unwrap().unwrap();
    assert_relative_eq!(position.quantity, 1.0);
}
