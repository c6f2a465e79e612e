//! Decision oracle port.
//!
//! The oracle sees the full technical picture plus current position and
//! recent outcomes, and answers with an action, a confidence in [0, 1] and
//! free-text reasoning. Prompting and transport live behind the trait.

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::alignment::{AlignmentSummary, TimeframeSnapshots};
use crate::domain::error::EngineError;
use crate::domain::lifecycle::Action;
use crate::domain::position::Position;

/// Everything the oracle gets to look at for one instrument.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub instrument: String,
    pub snapshots: TimeframeSnapshots,
    pub alignment: AlignmentSummary,
    pub position: Option<Position>,
    pub open_positions: Vec<Position>,
    /// Compact one-line summaries of the last few closed trades.
    pub recent_trades: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub confidence: f64,
    pub reasoning: String,
}

impl Decision {
    /// Safe fallback when the oracle is unreachable or returns garbage.
    pub fn hold(reasoning: impl Into<String>) -> Decision {
        Decision {
            action: Action::Hold,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

#[async_trait]
pub trait OraclePort: Send + Sync {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, EngineError>;
}
