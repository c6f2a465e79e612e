//! Trait seams for everything outside the core: market data, order
//! execution, the decision oracle, persistence and configuration.

pub mod config_port;
pub mod execution;
pub mod market_data;
pub mod oracle;
pub mod store;
