//! Pure domain logic: no I/O, no clocks of its own, no globals.

pub mod alignment;
pub mod candle;
pub mod config;
pub mod error;
pub mod indicator;
pub mod lifecycle;
pub mod market;
pub mod metrics;
pub mod position;
pub mod risk;
