//! tradepilot — multi-timeframe trading decision and position lifecycle
//! engine.
//!
//! Hexagonal architecture: pure logic in [`domain`], port traits in
//! [`ports`], orchestration in [`engine`], concrete implementations in
//! [`adapters`]. Exchange transports and the decision oracle live behind
//! ports; this crate supplies the decision pipeline, the position state
//! machine, risk ceilings, and broker-closure reconciliation.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod engine;
pub mod ports;
