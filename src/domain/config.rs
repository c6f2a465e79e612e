//! Typed engine configuration, built and validated from a [`ConfigPort`].
//!
//! Sections: `[engine]`, `[risk]`, `[indicators]`, `[store]`, and one of
//! `[crypto]` / `[equity]` per enabled market. Missing keys fall back to
//! defaults where a default is sensible; structural problems (no market
//! enabled, inverted EMA periods, out-of-range threshold) are hard errors.

use crate::domain::error::EngineError;
use crate::domain::indicator::IndicatorParams;
use crate::domain::market::MarketSpec;
use crate::domain::risk::RiskLimits;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct MarketConfig {
    pub spec: MarketSpec,
    pub instruments: Vec<String>,
    /// Quote-currency size of one opening order.
    pub trade_amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub check_interval_secs: u64,
    pub confidence_threshold: f64,
    pub max_daily_trades: u32,
    pub indicators: IndicatorParams,
    pub risk: RiskLimits,
    pub markets: Vec<MarketConfig>,
    pub store_path: String,
}

impl EngineConfig {
    pub fn load(config: &dyn ConfigPort) -> Result<EngineConfig, EngineError> {
        let check_interval_secs = positive_int(config, "engine", "check_interval_secs", 300)?;
        let confidence_threshold =
            config.get_double("engine", "confidence_threshold", 0.6);
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(invalid(
                "engine",
                "confidence_threshold",
                "must be between 0 and 1",
            ));
        }
        let max_daily_trades = positive_int(config, "engine", "max_daily_trades", 10)? as u32;

        let indicators = load_indicators(config)?;
        let risk = load_risk(config)?;

        let mut markets = Vec::new();
        if config.get_bool("crypto", "enabled", false) {
            markets.push(load_market(
                config,
                "crypto",
                MarketSpec::crypto(config.get_bool("crypto", "sandbox", true)),
            )?);
        }
        if config.get_bool("equity", "enabled", false) {
            markets.push(load_market(
                config,
                "equity",
                MarketSpec::equity_intraday(config.get_bool("equity", "sandbox", true)),
            )?);
        }
        if markets.is_empty() {
            return Err(invalid("engine", "markets", "no market section enabled"));
        }

        let store_path = config
            .get_string("store", "path")
            .unwrap_or_else(|| "tradepilot.db".to_string());

        Ok(EngineConfig {
            check_interval_secs: check_interval_secs as u64,
            confidence_threshold,
            max_daily_trades,
            indicators,
            risk,
            markets,
            store_path,
        })
    }
}

fn load_indicators(config: &dyn ConfigPort) -> Result<IndicatorParams, EngineError> {
    let defaults = IndicatorParams::default();
    let params = IndicatorParams {
        ema_short: positive_int(config, "indicators", "ema_short", defaults.ema_short as i64)?
            as usize,
        ema_long: positive_int(config, "indicators", "ema_long", defaults.ema_long as i64)?
            as usize,
        macd_signal: positive_int(
            config,
            "indicators",
            "macd_signal",
            defaults.macd_signal as i64,
        )? as usize,
        rsi_period: positive_int(
            config,
            "indicators",
            "rsi_period",
            defaults.rsi_period as i64,
        )? as usize,
        bb_period: positive_int(config, "indicators", "bb_period", defaults.bb_period as i64)?
            as usize,
        bb_stddev: config.get_double("indicators", "bb_stddev", defaults.bb_stddev),
        atr_period: positive_int(
            config,
            "indicators",
            "atr_period",
            defaults.atr_period as i64,
        )? as usize,
    };
    if params.ema_short >= params.ema_long {
        return Err(invalid(
            "indicators",
            "ema_short",
            "must be shorter than ema_long",
        ));
    }
    if params.bb_stddev <= 0.0 {
        return Err(invalid("indicators", "bb_stddev", "must be positive"));
    }
    Ok(params)
}

fn load_risk(config: &dyn ConfigPort) -> Result<RiskLimits, EngineError> {
    let defaults = RiskLimits::default();
    let limits = RiskLimits {
        max_open_positions: positive_int(
            config,
            "risk",
            "max_open_positions",
            defaults.max_open_positions as i64,
        )? as usize,
        max_position_value: config.get_double(
            "risk",
            "max_position_value",
            defaults.max_position_value,
        ),
        max_portfolio_exposure: config.get_double(
            "risk",
            "max_portfolio_exposure",
            defaults.max_portfolio_exposure,
        ),
    };
    if limits.max_position_value <= 0.0 {
        return Err(invalid("risk", "max_position_value", "must be positive"));
    }
    if limits.max_portfolio_exposure < limits.max_position_value {
        return Err(invalid(
            "risk",
            "max_portfolio_exposure",
            "must be at least max_position_value",
        ));
    }
    Ok(limits)
}

fn load_market(
    config: &dyn ConfigPort,
    section: &str,
    spec: MarketSpec,
) -> Result<MarketConfig, EngineError> {
    let instruments: Vec<String> = config
        .get_string(section, "instruments")
        .map(|s| {
            s.split(',')
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if instruments.is_empty() {
        return Err(EngineError::ConfigMissing {
            section: section.to_string(),
            key: "instruments".to_string(),
        });
    }

    let trade_amount = config.get_double(section, "trade_amount", 0.0);
    if trade_amount <= 0.0 {
        return Err(invalid(section, "trade_amount", "must be positive"));
    }

    Ok(MarketConfig {
        spec,
        instruments,
        trade_amount,
    })
}

fn positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, EngineError> {
    let value = config.get_int(section, key, default);
    if value <= 0 {
        return Err(invalid(section, key, "must be positive"));
    }
    Ok(value)
}

fn invalid(section: &str, key: &str, reason: &str) -> EngineError {
    EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
