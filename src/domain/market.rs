//! Market capability descriptors.
//!
//! One engine serves both the crypto exchange and the equity broker; the
//! differences (shorting, lot granularity, session hours, forced square-off)
//! live in a `MarketSpec` value instead of per-market code paths.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc, Weekday};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MarketKind {
    Crypto,
    Equity,
}

impl MarketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketKind::Crypto => "crypto",
            MarketKind::Equity => "equity",
        }
    }

    pub fn parse(s: &str) -> Option<MarketKind> {
        match s {
            "crypto" => Some(MarketKind::Crypto),
            "equity" => Some(MarketKind::Equity),
            _ => None,
        }
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProductType {
    Spot,
    Intraday,
    Delivery,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Spot => "spot",
            ProductType::Intraday => "intraday",
            ProductType::Delivery => "delivery",
        }
    }

    pub fn parse(s: &str) -> Option<ProductType> {
        match s {
            "spot" => Some(ProductType::Spot),
            "intraday" => Some(ProductType::Intraday),
            "delivery" => Some(ProductType::Delivery),
            _ => None,
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A daily trading session in a fixed local offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradingWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
    /// Exchange-local offset from UTC, in minutes (IST = +330).
    pub utc_offset_minutes: i32,
}

impl TradingWindow {
    fn local(&self, at: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).map(|off| at.with_timezone(&off))
    }

    /// True when `at` falls inside the session on a weekday.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let Some(local) = self.local(at) else {
            return false;
        };
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let t = local.time();
        t >= self.open && t <= self.close
    }
}

/// Everything the engine needs to know about a venue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSpec {
    pub kind: MarketKind,
    pub product_type: ProductType,
    pub sandbox: bool,
    pub supports_shorting: bool,
    pub fractional_lots: bool,
    pub currency: String,
    /// None means 24/7.
    pub session: Option<TradingWindow>,
    /// Broker forced-close cutoff, exchange-local time. Reconciliation runs
    /// shortly after this.
    pub square_off: Option<NaiveTime>,
}

/// NSE exchange offset (IST, UTC+5:30).
pub const IST_OFFSET_MINUTES: i32 = 330;

impl MarketSpec {
    /// Spot crypto: fractional lots, no shorting, trades around the clock.
    pub fn crypto(sandbox: bool) -> MarketSpec {
        MarketSpec {
            kind: MarketKind::Crypto,
            product_type: ProductType::Spot,
            sandbox,
            supports_shorting: false,
            fractional_lots: true,
            currency: "USDT".to_string(),
            session: None,
            square_off: None,
        }
    }

    /// NSE intraday equity: whole-share lots, shorting allowed, 09:15-15:30
    /// IST session with a 15:20 broker square-off.
    pub fn equity_intraday(sandbox: bool) -> MarketSpec {
        MarketSpec {
            kind: MarketKind::Equity,
            product_type: ProductType::Intraday,
            sandbox,
            supports_shorting: true,
            fractional_lots: false,
            currency: "INR".to_string(),
            session: Some(TradingWindow {
                open: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
                close: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
                utc_offset_minutes: IST_OFFSET_MINUTES,
            }),
            square_off: NaiveTime::from_hms_opt(15, 20, 0),
        }
    }

    pub fn scope(&self) -> crate::domain::position::Scope {
        crate::domain::position::Scope {
            market: self.kind,
            product_type: self.product_type,
            sandbox: self.sandbox,
        }
    }

    /// Floor a raw quantity to the venue's lot granularity. Fractional
    /// venues keep 8 decimal places; others trade whole units.
    pub fn round_quantity(&self, quantity: f64) -> f64 {
        if self.fractional_lots {
            (quantity * 1e8).floor() / 1e8
        } else {
            quantity.floor()
        }
    }

    /// True when the venue accepts orders at `at`. Session-less venues
    /// always do.
    pub fn in_session(&self, at: DateTime<Utc>) -> bool {
        match &self.session {
            Some(window) => window.contains(at),
            None => true,
        }
    }

    /// Weekday check in exchange-local time; session-less venues trade
    /// every day.
    pub fn is_trading_day(&self, at: DateTime<Utc>) -> bool {
        let Some(window) = &self.session else {
            return true;
        };
        match window.local(at) {
            Some(local) => !matches!(local.weekday(), Weekday::Sat | Weekday::Sun),
            None => false,
        }
    }
}
