//! Multi-timeframe alignment scoring.
//!
//! Combines the four per-timeframe snapshots (5m, 1h, 4h, 1d) into one
//! directional summary. MACD carries the most weight, then RSI, then EMA;
//! the higher timeframes (4h, 1d) act as bias and overbought/oversold
//! filters.

use std::fmt;

use serde::Serialize;

use crate::domain::indicator::{Crossover, IndicatorSnapshot, Trend};

/// The four snapshots a scoring pass consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeframeSnapshots {
    pub m5: IndicatorSnapshot,
    pub h1: IndicatorSnapshot,
    pub h4: IndicatorSnapshot,
    pub d1: IndicatorSnapshot,
}

impl TimeframeSnapshots {
    pub fn is_ready(&self) -> bool {
        self.m5.is_ready() && self.h1.is_ready() && self.h4.is_ready() && self.d1.is_ready()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Alignment {
    StrongBullish,
    StrongBearish,
    BullishMacdHtf,
    BearishMacdHtf,
    Mixed,
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alignment::StrongBullish => write!(f, "STRONG_BULLISH"),
            Alignment::StrongBearish => write!(f, "STRONG_BEARISH"),
            Alignment::BullishMacdHtf => write!(f, "BULLISH_MACD_HTF"),
            Alignment::BearishMacdHtf => write!(f, "BEARISH_MACD_HTF"),
            Alignment::Mixed => write!(f, "MIXED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentSummary {
    pub current_price: f64,
    pub macd_bullish_count: u8,
    pub rsi_bullish_count: u8,
    pub ema_bullish_count: u8,
    pub higher_tf_macd_bullish: bool,
    pub higher_tf_macd_bearish: bool,
    pub higher_tf_rsi_overbought: bool,
    pub higher_tf_rsi_oversold: bool,
    pub has_higher_tf_macd_crossover: bool,
    pub alignment: Alignment,
}

impl AlignmentSummary {
    pub fn score(snapshots: &TimeframeSnapshots) -> AlignmentSummary {
        let all = [
            &snapshots.m5,
            &snapshots.h1,
            &snapshots.h4,
            &snapshots.d1,
        ];

        let macd_bullish_count = all
            .iter()
            .filter(|s| s.macd_trend == Trend::Bullish)
            .count() as u8;

        let ema_bullish_count = all
            .iter()
            .filter(|s| s.ema_trend == Trend::Bullish)
            .count() as u8;

        // Intentionally asymmetric: on the lower timeframes only a neutral
        // RSI counts (safe to enter), on the higher timeframes anything not
        // overbought counts.
        let rsi_bullish_count = [
            snapshots.m5.rsi > 30.0 && snapshots.m5.rsi < 70.0,
            snapshots.h1.rsi > 30.0 && snapshots.h1.rsi < 70.0,
            snapshots.h4.rsi < 70.0,
            snapshots.d1.rsi < 70.0,
        ]
        .iter()
        .filter(|b| **b)
        .count() as u8;

        let higher_tf_macd_bullish = snapshots.h4.macd_trend == Trend::Bullish
            && snapshots.d1.macd_trend == Trend::Bullish;
        let higher_tf_macd_bearish = snapshots.h4.macd_trend == Trend::Bearish
            && snapshots.d1.macd_trend == Trend::Bearish;

        let higher_tf_rsi_overbought = snapshots.h4.rsi > 70.0 || snapshots.d1.rsi > 70.0;
        let higher_tf_rsi_oversold = snapshots.h4.rsi < 30.0 || snapshots.d1.rsi < 30.0;

        let has_higher_tf_macd_crossover = snapshots.h4.macd_crossover != Crossover::None
            || snapshots.d1.macd_crossover != Crossover::None;

        let alignment = if macd_bullish_count >= 3 && !higher_tf_rsi_overbought {
            Alignment::StrongBullish
        } else if macd_bullish_count <= 1 && !higher_tf_rsi_oversold {
            Alignment::StrongBearish
        } else if higher_tf_macd_bullish && !higher_tf_rsi_overbought {
            Alignment::BullishMacdHtf
        } else if higher_tf_macd_bearish && !higher_tf_rsi_oversold {
            Alignment::BearishMacdHtf
        } else {
            Alignment::Mixed
        };

        AlignmentSummary {
            current_price: snapshots.m5.price,
            macd_bullish_count,
            rsi_bullish_count,
            ema_bullish_count,
            higher_tf_macd_bullish,
            higher_tf_macd_bearish,
            higher_tf_rsi_overbought,
            higher_tf_rsi_oversold,
            has_higher_tf_macd_crossover,
            alignment,
        }
    }
}
