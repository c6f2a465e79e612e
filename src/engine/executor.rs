//! Per-instrument decision cycle.
//!
//! Gathers the four timeframe snapshots, scores alignment, asks the oracle,
//! applies the confidence gate and the risk limiter, then drives the
//! position lifecycle with real fills. An oracle failure degrades to HOLD;
//! a risk block aborts the instrument before any order is placed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::alignment::{AlignmentSummary, TimeframeSnapshots};
use crate::domain::candle::Timeframe;
use crate::domain::config::MarketConfig;
use crate::domain::error::EngineError;
use crate::domain::indicator::{IndicatorParams, IndicatorSnapshot};
use crate::domain::lifecycle::{self, Action, Fill, Leg};
use crate::domain::position::{Position, PositionKey, Side, Trade, TradeStatus};
use crate::domain::risk::{self, RiskLimits, RiskVerdict};
use crate::ports::execution::OrderExecutionPort;
use crate::ports::market_data::MarketDataPort;
use crate::ports::oracle::{Decision, DecisionRequest, OraclePort};
use crate::ports::store::PositionStore;

/// How one instrument's cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentOutcome {
    /// Nothing to do: HOLD action, gated confidence, or an empty plan.
    Held,
    /// Orders were placed and positions updated.
    Traded { orders: usize },
    /// The risk limiter refused the opening leg; nothing was executed.
    Blocked { reason: String },
}

pub struct DecisionExecutor {
    market_data: Arc<dyn MarketDataPort>,
    execution: Arc<dyn OrderExecutionPort>,
    oracle: Arc<dyn OraclePort>,
    store: Arc<dyn PositionStore>,
    market: MarketConfig,
    indicators: IndicatorParams,
    risk: RiskLimits,
    confidence_threshold: f64,
}

impl DecisionExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market_data: Arc<dyn MarketDataPort>,
        execution: Arc<dyn OrderExecutionPort>,
        oracle: Arc<dyn OraclePort>,
        store: Arc<dyn PositionStore>,
        market: MarketConfig,
        indicators: IndicatorParams,
        risk: RiskLimits,
        confidence_threshold: f64,
    ) -> DecisionExecutor {
        DecisionExecutor {
            market_data,
            execution,
            oracle,
            store,
            market,
            indicators,
            risk,
            confidence_threshold,
        }
    }

    pub fn market(&self) -> &MarketConfig {
        &self.market
    }

    /// One full analyze-decide-execute pass for `instrument`.
    pub async fn process_instrument(
        &self,
        instrument: &str,
    ) -> Result<InstrumentOutcome, EngineError> {
        let snapshots = self.gather_snapshots(instrument).await?;
        let alignment = AlignmentSummary::score(&snapshots);

        let key = PositionKey::new(instrument, self.market.spec.scope());
        let position = self.store.get_position(&key)?;
        let open_positions = self.store.open_positions(key.scope)?;
        let recent = self.recent_trade_summaries(&key)?;

        let request = DecisionRequest {
            instrument: instrument.to_string(),
            snapshots,
            alignment: alignment.clone(),
            position: position.clone(),
            open_positions,
            recent_trades: recent,
        };

        let decision = match self.oracle.decide(&request).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(instrument, error = %e, "oracle unavailable, holding");
                Decision::hold(format!("oracle error: {e}"))
            }
        };

        info!(
            instrument,
            action = decision.action.as_str(),
            confidence = decision.confidence,
            alignment = %alignment.alignment,
            "decision"
        );

        if decision.action != Action::Hold && decision.confidence < self.confidence_threshold {
            info!(
                instrument,
                confidence = decision.confidence,
                threshold = self.confidence_threshold,
                "confidence below threshold, holding"
            );
            return Ok(InstrumentOutcome::Held);
        }

        self.execute_action(
            instrument,
            position,
            decision.action,
            decision.confidence,
            &decision.reasoning,
            None,
        )
        .await
    }

    /// Operator-initiated trade: same lifecycle and risk path, no oracle
    /// and no confidence gate.
    pub async fn execute_manual_trade(
        &self,
        instrument: &str,
        side: Side,
        quantity: Option<f64>,
    ) -> Result<InstrumentOutcome, EngineError> {
        let key = PositionKey::new(instrument, self.market.spec.scope());
        let position = self.store.get_position(&key)?;
        let action = match side {
            Side::Buy => Action::Buy,
            Side::Sell => Action::Sell,
        };
        self.execute_action(instrument, position, action, 1.0, "manual trade", quantity)
            .await
    }

    async fn gather_snapshots(
        &self,
        instrument: &str,
    ) -> Result<TimeframeSnapshots, EngineError> {
        let minimum = self.indicators.min_bars();
        let mut snapshots = Vec::with_capacity(Timeframe::ALL.len());
        for timeframe in Timeframe::ALL {
            let candles = self
                .market_data
                .get_candles(instrument, timeframe, timeframe.fetch_limit())
                .await?;
            if candles.len() < minimum {
                return Err(EngineError::InsufficientData {
                    instrument: instrument.to_string(),
                    timeframe: timeframe.to_string(),
                    bars: candles.len(),
                    minimum,
                });
            }
            let snapshot = IndicatorSnapshot::compute(&candles, &self.indicators);
            if !snapshot.is_ready() {
                return Err(EngineError::InsufficientData {
                    instrument: instrument.to_string(),
                    timeframe: timeframe.to_string(),
                    bars: candles.len(),
                    minimum,
                });
            }
            snapshots.push(snapshot);
        }
        let mut iter = snapshots.into_iter();
        // Four timeframes by construction.
        match (iter.next(), iter.next(), iter.next(), iter.next()) {
            (Some(m5), Some(h1), Some(h4), Some(d1)) => Ok(TimeframeSnapshots { m5, h1, h4, d1 }),
            _ => Err(EngineError::MarketData {
                instrument: instrument.to_string(),
                reason: "incomplete timeframe set".to_string(),
            }),
        }
    }

    fn recent_trade_summaries(&self, key: &PositionKey) -> Result<Vec<String>, EngineError> {
        let trades = self.store.recent_trades(key, 3)?;
        Ok(trades
            .iter()
            .map(|t| match (t.status, t.realized_pl) {
                (TradeStatus::Closed, Some(pl)) => format!(
                    "{} {} @ {:.4} closed, pl {:.2}",
                    t.side, t.quantity, t.entry_price, pl
                ),
                _ => format!("{} {} @ {:.4} open", t.side, t.quantity, t.entry_price),
            })
            .collect())
    }

    async fn execute_action(
        &self,
        instrument: &str,
        mut position: Option<Position>,
        action: Action,
        confidence: f64,
        reasoning: &str,
        quantity_override: Option<f64>,
    ) -> Result<InstrumentOutcome, EngineError> {
        let state = position.as_ref().map(Position::state);
        let legs = lifecycle::plan(action, state, self.market.spec.supports_shorting);
        if legs.is_empty() {
            return Ok(InstrumentOutcome::Held);
        }

        let quote = self.market_data.get_price(instrument).await?;

        // Risk-check the opening leg before placing anything, so a block
        // never leaves a half-executed plan. When the plan closes first
        // (a flip), the opening leg executes against the post-close book.
        if legs.iter().any(Leg::creates_exposure) {
            let proposed_value = quantity_override
                .map(|q| q * quote)
                .unwrap_or(self.market.trade_amount);
            let after_close = matches!(legs.first(), Some(Leg::Close { .. }));
            let verdict = self.check_risk(instrument, proposed_value, after_close);
            if let RiskVerdict::Blocked { reason } = verdict {
                warn!(instrument, reason, "risk limiter blocked trade");
                return Ok(InstrumentOutcome::Blocked { reason });
            }
        }

        let key = PositionKey::new(instrument, self.market.spec.scope());
        let mut orders = 0usize;

        for leg in legs {
            let order_quantity = match leg {
                Leg::Close { .. } => match &position {
                    Some(p) => p.quantity.abs(),
                    None => {
                        return Err(EngineError::MissingPosition {
                            instrument: instrument.to_string(),
                        })
                    }
                },
                Leg::Open { .. } | Leg::Add { .. } => {
                    let raw = quantity_override
                        .unwrap_or(self.market.trade_amount / quote);
                    let rounded = self.market.spec.round_quantity(raw);
                    if rounded <= 0.0 {
                        warn!(
                            instrument,
                            raw, "trade amount too small for one lot, skipping leg"
                        );
                        continue;
                    }
                    rounded
                }
            };

            let report = self
                .execution
                .place_market_order(instrument, leg.side(), order_quantity)
                .await?;
            let fill = Fill {
                order_id: report.order_id,
                quantity: report.filled_quantity,
                price: report.filled_price.unwrap_or(quote),
            };
            orders += 1;

            position = self.apply_leg(&key, leg, &fill, position, confidence, reasoning)?;
        }

        if orders == 0 {
            return Ok(InstrumentOutcome::Held);
        }
        Ok(InstrumentOutcome::Traded { orders })
    }

    /// Fail-open: a store error during the risk read allows the trade and
    /// logs the degradation. With `after_close` the instrument's own
    /// position is dropped from the snapshot, since the plan closes it
    /// before the opening leg runs.
    fn check_risk(&self, instrument: &str, proposed_value: f64, after_close: bool) -> RiskVerdict {
        match self.store.open_positions(self.market.spec.scope()) {
            Ok(mut open) => {
                if after_close {
                    open.retain(|p| p.key.instrument != instrument);
                }
                risk::check_new_exposure(instrument, proposed_value, &open, &self.risk)
            }
            Err(e) => {
                warn!(instrument, error = %e, "risk state unavailable, allowing trade");
                RiskVerdict::Allowed
            }
        }
    }

    /// Persist one leg's effect: position row plus ledger row, metrics on
    /// close. Returns the position as it stands after the leg.
    fn apply_leg(
        &self,
        key: &PositionKey,
        leg: Leg,
        fill: &Fill,
        position: Option<Position>,
        confidence: f64,
        reasoning: &str,
    ) -> Result<Option<Position>, EngineError> {
        let now = Utc::now();
        match leg {
            Leg::Open { side } => {
                let opened = lifecycle::open_position(key.clone(), side, fill, now);
                self.store.upsert_position(&opened)?;
                self.store.insert_trade(&Trade {
                    id: None,
                    key: key.clone(),
                    side,
                    quantity: fill.quantity,
                    entry_price: fill.price,
                    exit_price: None,
                    status: TradeStatus::Open,
                    realized_pl: None,
                    realized_pl_pct: None,
                    confidence,
                    reasoning: reasoning.to_string(),
                    order_id: fill.order_id.clone(),
                    broker_initiated: false,
                    created_at: now,
                    closed_at: None,
                })?;
                info!(
                    instrument = key.instrument,
                    side = %side,
                    quantity = fill.quantity,
                    price = fill.price,
                    "opened position"
                );
                Ok(Some(opened))
            }
            Leg::Add { side } => {
                let mut current = position.ok_or_else(|| EngineError::MissingPosition {
                    instrument: key.instrument.clone(),
                })?;
                lifecycle::add_to_position(&mut current, fill, now);
                self.store.upsert_position(&current)?;
                self.store.insert_trade(&Trade {
                    id: None,
                    key: key.clone(),
                    side,
                    quantity: fill.quantity,
                    entry_price: fill.price,
                    exit_price: None,
                    status: TradeStatus::Open,
                    realized_pl: None,
                    realized_pl_pct: None,
                    confidence,
                    reasoning: reasoning.to_string(),
                    order_id: fill.order_id.clone(),
                    broker_initiated: false,
                    created_at: now,
                    closed_at: None,
                })?;
                info!(
                    instrument = key.instrument,
                    quantity = current.quantity,
                    entry_price = current.entry_price,
                    "added to position"
                );
                Ok(Some(current))
            }
            Leg::Close { side } => {
                let current = position.ok_or_else(|| EngineError::MissingPosition {
                    instrument: key.instrument.clone(),
                })?;
                let outcome = lifecycle::close_outcome(&current, fill.price);
                self.store.insert_trade(&Trade {
                    id: None,
                    key: key.clone(),
                    side,
                    quantity: current.quantity.abs(),
                    entry_price: current.entry_price,
                    exit_price: Some(fill.price),
                    status: TradeStatus::Closed,
                    realized_pl: Some(outcome.realized_pl),
                    realized_pl_pct: Some(outcome.realized_pl_pct),
                    confidence,
                    reasoning: reasoning.to_string(),
                    order_id: fill.order_id.clone(),
                    broker_initiated: false,
                    created_at: now,
                    closed_at: Some(now),
                })?;
                self.store.delete_position(key)?;

                let mut metrics = self.store.get_metrics(key.scope)?;
                metrics.record_close(outcome.realized_pl, now);
                self.store.put_metrics(key.scope, &metrics)?;

                info!(
                    instrument = key.instrument,
                    realized_pl = outcome.realized_pl,
                    realized_pl_pct = outcome.realized_pl_pct,
                    "closed position"
                );
                Ok(None)
            }
        }
    }
}
