//! Orchestration: the market loop, the per-instrument decision executor,
//! and the reconciliation schedule.

pub mod bot;
pub mod executor;
pub mod reconcile;
