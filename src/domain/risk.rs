//! Pre-trade risk ceilings.
//!
//! Pure check over a snapshot of open positions. Consulted only before
//! opening or adding exposure, never before closing or reducing it. The
//! call site degrades a store read failure to Allowed (fail-open) and logs
//! it; that tradeoff lives in the engine, not here.

use serde::Serialize;

use crate::domain::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskLimits {
    pub max_open_positions: usize,
    /// Ceiling on |qty|·price + proposal for one instrument, quote currency.
    pub max_position_value: f64,
    /// Ceiling on total open exposure plus the proposal.
    pub max_portfolio_exposure: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskLimits {
            max_open_positions: 3,
            max_position_value: 1_000.0,
            max_portfolio_exposure: 2_500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskVerdict {
    Allowed,
    Blocked { reason: String },
}

impl RiskVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RiskVerdict::Allowed)
    }
}

/// Evaluate a proposed new exposure (quote-currency value) for `instrument`
/// against the open book. All three ceilings must pass.
pub fn check_new_exposure(
    instrument: &str,
    proposed_value: f64,
    open_positions: &[Position],
    limits: &RiskLimits,
) -> RiskVerdict {
    // The slot ceiling applies to every new exposure, adds included.
    if open_positions.len() >= limits.max_open_positions {
        return RiskVerdict::Blocked {
            reason: format!(
                "max open positions reached ({}/{})",
                open_positions.len(),
                limits.max_open_positions
            ),
        };
    }

    let instrument_value = open_positions
        .iter()
        .find(|p| p.key.instrument == instrument)
        .map(Position::exposure)
        .unwrap_or(0.0);
    if instrument_value + proposed_value > limits.max_position_value {
        return RiskVerdict::Blocked {
            reason: format!(
                "position value for {instrument} would reach {:.2}, limit {:.2}",
                instrument_value + proposed_value,
                limits.max_position_value
            ),
        };
    }

    let portfolio_value: f64 = open_positions.iter().map(Position::exposure).sum();
    if portfolio_value + proposed_value > limits.max_portfolio_exposure {
        return RiskVerdict::Blocked {
            reason: format!(
                "portfolio exposure would reach {:.2}, limit {:.2}",
                portfolio_value + proposed_value,
                limits.max_portfolio_exposure
            ),
        };
    }

    RiskVerdict::Allowed
}
