//! Engine error taxonomy.
//!
//! One enum covers every failure class; the engine decides per class
//! whether to degrade, skip, or propagate. Nothing here is fatal to a
//! market loop.

use std::process::ExitCode;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store: {0}")]
    Store(String),

    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    #[error("missing config value [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("market data for {instrument}: {reason}")]
    MarketData { instrument: String, reason: String },

    #[error("order execution: {0}")]
    OrderExecution(String),

    #[error("oracle: {0}")]
    Oracle(String),

    #[error("insufficient data for {instrument} {timeframe}: {bars} bars, need {minimum}")]
    InsufficientData {
        instrument: String,
        timeframe: String,
        bars: usize,
        minimum: usize,
    },

    #[error("no open position for {instrument}")]
    MissingPosition { instrument: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Store(err.to_string())
    }
}

impl From<r2d2::Error> for EngineError {
    fn from(err: r2d2::Error) -> Self {
        EngineError::Store(err.to_string())
    }
}

impl From<&EngineError> for ExitCode {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::ConfigParse(_)
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => ExitCode::from(2),
            EngineError::Store(_) => ExitCode::from(3),
            _ => ExitCode::FAILURE,
        }
    }
}
