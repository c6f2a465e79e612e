//! Concrete port implementations.

pub mod file_config_adapter;
pub mod sqlite_store;
