//! Per-scope aggregate trading metrics, updated exactly once per closed
//! trade.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotMetrics {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub total_realized_pl: f64,
    /// Percentage of decided (non-breakeven) closes that won.
    pub win_rate: f64,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl BotMetrics {
    pub fn empty(at: DateTime<Utc>) -> BotMetrics {
        BotMetrics {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            total_realized_pl: 0.0,
            win_rate: 0.0,
            last_trade_time: None,
            updated_at: at,
        }
    }

    /// Fold one closed trade in. Breakeven closes count toward the total
    /// but not toward the win rate.
    pub fn record_close(&mut self, realized_pl: f64, at: DateTime<Utc>) {
        self.total_trades += 1;
        if realized_pl > 0.0 {
            self.winning_trades += 1;
        } else if realized_pl < 0.0 {
            self.losing_trades += 1;
        }
        self.total_realized_pl += realized_pl;
        let decided = self.winning_trades + self.losing_trades;
        self.win_rate = if decided > 0 {
            self.winning_trades as f64 / decided as f64 * 100.0
        } else {
            0.0
        };
        self.last_trade_time = Some(at);
        self.updated_at = at;
    }
}
