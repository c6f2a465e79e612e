//! Positions and the trade ledger.
//!
//! A [`Position`] is the one live exposure for a scoped key; quantity is
//! signed, negative meaning short. [`Trade`] rows are append-only ledger
//! entries; a close attaches exit fields to the opening row's data, it never
//! rewrites history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::market::{MarketKind, ProductType};

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Option<Side> {
        match s {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a live position. A flat instrument has no Position row at
/// all, so there is no `None` variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PositionState {
    Long,
    Short,
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionState::Long => f.write_str("LONG"),
            PositionState::Short => f.write_str("SHORT"),
        }
    }
}

/// The (market, product_type, sandbox) triple that namespaces positions,
/// trades and metrics. Live and sandbox books never mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Scope {
    pub market: MarketKind,
    pub product_type: ProductType,
    pub sandbox: bool,
}

/// Full key of a live position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PositionKey {
    pub instrument: String,
    pub scope: Scope,
}

impl PositionKey {
    pub fn new(instrument: impl Into<String>, scope: Scope) -> PositionKey {
        PositionKey {
            instrument: instrument.into(),
            scope,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub key: PositionKey,
    /// Signed: positive long, negative short. Never zero for a stored row.
    pub quantity: f64,
    /// Volume-weighted average entry.
    pub entry_price: f64,
    pub current_price: f64,
    pub unrealized_pl: f64,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    pub fn state(&self) -> PositionState {
        if self.quantity < 0.0 {
            PositionState::Short
        } else {
            PositionState::Long
        }
    }

    /// Absolute exposure at the current mark.
    pub fn exposure(&self) -> f64 {
        self.quantity.abs() * self.current_price
    }

    /// Re-mark against a fresh price.
    pub fn mark(&mut self, price: f64, at: DateTime<Utc>) {
        self.current_price = price;
        self.unrealized_pl = if self.is_short() {
            (self.entry_price - price) * self.quantity.abs()
        } else {
            (price - self.entry_price) * self.quantity
        };
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeStatus {
    Open,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "OPEN",
            TradeStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(s: &str) -> Option<TradeStatus> {
        match s {
            "OPEN" => Some(TradeStatus::Open),
            "CLOSED" => Some(TradeStatus::Closed),
            _ => None,
        }
    }
}

/// One ledger row. `order_id` is unique across the book and is the
/// idempotency handle for reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub id: Option<i64>,
    pub key: PositionKey,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub status: TradeStatus,
    pub realized_pl: Option<f64>,
    pub realized_pl_pct: Option<f64>,
    pub confidence: f64,
    pub reasoning: String,
    pub order_id: String,
    pub broker_initiated: bool,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}
