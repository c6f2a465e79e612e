//! CLI definition and dispatch.
//!
//! The engine itself is a library surface; transports plug in behind the
//! port traits. The binary covers the operational chores that need no
//! transport: config validation and store initialization.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_store::SqliteStore;
use crate::domain::config::EngineConfig;
use crate::domain::error::EngineError;

#[derive(Parser, Debug)]
#[command(name = "tradepilot", about = "Trading decision and position lifecycle engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate an engine configuration
    ValidateConfig {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create the position/trade store schema
    InitStore {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let result = match cli.command {
        Command::ValidateConfig { config } => validate_config(&config),
        Command::InitStore { config } => init_store(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

fn load(path: &PathBuf) -> Result<FileConfigAdapter, EngineError> {
    FileConfigAdapter::from_file(path).map_err(EngineError::Io)
}

fn validate_config(path: &PathBuf) -> Result<(), EngineError> {
    let adapter = load(path)?;
    let config = EngineConfig::load(&adapter)?;
    println!("configuration is valid");
    println!("  check interval: {}s", config.check_interval_secs);
    println!("  confidence threshold: {}", config.confidence_threshold);
    println!("  max daily trades: {}", config.max_daily_trades);
    for market in &config.markets {
        println!(
            "  market {} ({}, sandbox={}): {} instruments, trade amount {} {}",
            market.spec.kind,
            market.spec.product_type,
            market.spec.sandbox,
            market.instruments.len(),
            market.trade_amount,
            market.spec.currency,
        );
    }
    Ok(())
}

fn init_store(path: &PathBuf) -> Result<(), EngineError> {
    let adapter = load(path)?;
    let config = EngineConfig::load(&adapter)?;
    SqliteStore::from_config(&adapter)?;
    println!("store initialized at {}", config.store_path);
    Ok(())
}
