//! Position lifecycle: the per-instrument state machine.
//!
//! Split into a pure planner (which legs does this action imply given the
//! current state) and pure appliers (what does a fill do to the position).
//! The engine owns persistence; each leg is persisted before the next is
//! planned, and a close always lands before the opposite-side open.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::position::{Position, PositionKey, PositionState, Side};

/// Oracle action verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        }
    }
}

/// One order the engine must place to realize a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// Create a new position; Buy opens long, Sell opens short.
    Open { side: Side },
    /// Increase an existing same-direction position.
    Add { side: Side },
    /// Flatten the existing position; the side is the closing order's side.
    Close { side: Side },
}

impl Leg {
    /// Opening and adding legs create exposure and go through the risk
    /// limiter; closing legs never do.
    pub fn creates_exposure(&self) -> bool {
        matches!(self, Leg::Open { .. } | Leg::Add { .. })
    }

    pub fn side(&self) -> Side {
        match self {
            Leg::Open { side } | Leg::Add { side } | Leg::Close { side } => *side,
        }
    }
}

/// Map (action, current state) to the ordered legs to execute. SELL while
/// LONG closes first and, only where the venue supports shorting, flips
/// into a short. SELL while flat on a non-shorting venue is a no-op.
pub fn plan(
    action: Action,
    state: Option<PositionState>,
    supports_shorting: bool,
) -> Vec<Leg> {
    match (action, state) {
        (Action::Hold, _) => vec![],
        (Action::Buy, None) => vec![Leg::Open { side: Side::Buy }],
        (Action::Buy, Some(PositionState::Long)) => vec![Leg::Add { side: Side::Buy }],
        (Action::Buy, Some(PositionState::Short)) => vec![Leg::Close { side: Side::Buy }],
        (Action::Sell, Some(PositionState::Long)) => {
            let mut legs = vec![Leg::Close { side: Side::Sell }];
            if supports_shorting {
                legs.push(Leg::Open { side: Side::Sell });
            }
            legs
        }
        (Action::Sell, None) => {
            if supports_shorting {
                vec![Leg::Open { side: Side::Sell }]
            } else {
                vec![]
            }
        }
        (Action::Sell, Some(PositionState::Short)) => vec![Leg::Add { side: Side::Sell }],
    }
}

/// An executed market order, as reported back by the venue.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub order_id: String,
    pub quantity: f64,
    pub price: f64,
}

/// Build the position created by an opening fill.
pub fn open_position(key: PositionKey, side: Side, fill: &Fill, at: DateTime<Utc>) -> Position {
    let quantity = match side {
        Side::Buy => fill.quantity,
        Side::Sell => -fill.quantity,
    };
    Position {
        key,
        quantity,
        entry_price: fill.price,
        current_price: fill.price,
        unrealized_pl: 0.0,
        updated_at: at,
    }
}

/// Fold an adding fill into an existing position: volume-weighted entry,
/// quantity grows in the position's direction.
pub fn add_to_position(position: &mut Position, fill: &Fill, at: DateTime<Utc>) {
    let old_abs = position.quantity.abs();
    let new_abs = old_abs + fill.quantity;
    position.entry_price =
        (old_abs * position.entry_price + fill.quantity * fill.price) / new_abs;
    position.quantity = if position.is_short() { -new_abs } else { new_abs };
    position.mark(fill.price, at);
}

/// Result of flattening a position at `exit_price`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloseOutcome {
    pub realized_pl: f64,
    pub realized_pl_pct: f64,
}

/// Realized P&L of a full close: (exit − entry)·qty long, (entry − exit)·|qty|
/// short; percentage against the entry notional.
pub fn close_outcome(position: &Position, exit_price: f64) -> CloseOutcome {
    let abs_qty = position.quantity.abs();
    let realized_pl = if position.is_short() {
        (position.entry_price - exit_price) * abs_qty
    } else {
        (exit_price - position.entry_price) * position.quantity
    };
    let notional = position.entry_price * abs_qty;
    let realized_pl_pct = if notional > 0.0 {
        realized_pl / notional * 100.0
    } else {
        0.0
    };
    CloseOutcome {
        realized_pl,
        realized_pl_pct,
    }
}
