//! Technical indicator engine.
//!
//! Turns an ordered candle sequence into a fixed [`IndicatorSnapshot`]
//! (trend, momentum, volatility) for one timeframe. Pure: identical input
//! always yields an identical snapshot, and the only failure mode is
//! insufficient data, reported through NaN fields and [`IndicatorSnapshot::is_ready`].

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;

use crate::domain::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsiZone {
    Oversold,
    Neutral,
    Overbought,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    None,
    Bullish,
    Bearish,
}

/// Lookback periods for the full snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorParams {
    pub ema_short: usize,
    pub ema_long: usize,
    pub macd_signal: usize,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_stddev: f64,
    pub atr_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        // Tuned for hourly intraday signals; shorter periods, more sensitivity.
        IndicatorParams {
            ema_short: 6,
            ema_long: 18,
            macd_signal: 5,
            rsi_period: 7,
            bb_period: 20,
            bb_stddev: 2.0,
            atr_period: 14,
        }
    }
}

impl IndicatorParams {
    /// Minimum candle count for every snapshot field to be defined:
    /// longest lookback plus one (RSI and crossover need a prior bar).
    pub fn min_bars(&self) -> usize {
        let longest = self
            .ema_long
            .max(self.rsi_period)
            .max(self.bb_period)
            .max(self.atr_period);
        longest + 1
    }
}

/// Snapshot of the most recent bar, with the prior bar's MACD/signal/RSI
/// folded into the trend and crossover fields.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub price: f64,
    pub ema_short: f64,
    pub ema_long: f64,
    pub ema_trend: Trend,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub macd_trend: Trend,
    pub macd_crossover: Crossover,
    pub rsi: f64,
    pub rsi_zone: RsiZone,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub atr: f64,
    pub volume: f64,
}

impl IndicatorSnapshot {
    pub fn compute(candles: &[Candle], params: &IndicatorParams) -> IndicatorSnapshot {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let last = candles.len().saturating_sub(1);

        let ema_short_series = ema::ema(&closes, params.ema_short);
        let ema_long_series = ema::ema(&closes, params.ema_long);
        let macd_series = macd::macd(
            &closes,
            params.ema_short,
            params.ema_long,
            params.macd_signal,
        );
        let rsi_series = rsi::rsi(&closes, params.rsi_period);
        let bands = bollinger::bollinger(&closes, params.bb_period, params.bb_stddev);
        let atr_series = atr::atr(candles, params.atr_period);

        let at = |series: &[f64], i: usize| series.get(i).copied().unwrap_or(f64::NAN);

        let ema_short_v = at(&ema_short_series, last);
        let ema_long_v = at(&ema_long_series, last);
        let macd_v = at(&macd_series.line, last);
        let signal_v = at(&macd_series.signal, last);
        let rsi_v = at(&rsi_series, last);

        let macd_crossover = if last >= 1 {
            let prev_macd = at(&macd_series.line, last - 1);
            let prev_signal = at(&macd_series.signal, last - 1);
            detect_crossover(prev_macd, prev_signal, macd_v, signal_v)
        } else {
            Crossover::None
        };

        IndicatorSnapshot {
            price: candles.last().map(|c| c.close).unwrap_or(f64::NAN),
            ema_short: ema_short_v,
            ema_long: ema_long_v,
            ema_trend: trend_of(ema_short_v, ema_long_v),
            macd: macd_v,
            macd_signal: signal_v,
            macd_histogram: at(&macd_series.histogram, last),
            macd_trend: trend_of(macd_v, signal_v),
            macd_crossover,
            rsi: rsi_v,
            rsi_zone: rsi_zone_of(rsi_v),
            bb_upper: at(&bands.upper, last),
            bb_middle: at(&bands.middle, last),
            bb_lower: at(&bands.lower, last),
            atr: at(&atr_series, last),
            volume: candles.last().map(|c| c.volume).unwrap_or(f64::NAN),
        }
    }

    /// False when the input was too short for every field to be defined.
    /// Callers must treat a not-ready snapshot as insufficient data.
    pub fn is_ready(&self) -> bool {
        !self.rsi.is_nan() && !self.bb_middle.is_nan() && !self.atr.is_nan() && !self.price.is_nan()
    }
}

fn trend_of(value: f64, reference: f64) -> Trend {
    if value > reference {
        Trend::Bullish
    } else {
        Trend::Bearish
    }
}

fn rsi_zone_of(rsi: f64) -> RsiZone {
    if rsi < 30.0 {
        RsiZone::Oversold
    } else if rsi > 70.0 {
        RsiZone::Overbought
    } else {
        RsiZone::Neutral
    }
}

/// Sign flip of (macd - signal) between consecutive bars.
fn detect_crossover(prev_macd: f64, prev_signal: f64, macd: f64, signal: f64) -> Crossover {
    if prev_macd.is_nan() || prev_signal.is_nan() || macd.is_nan() || signal.is_nan() {
        return Crossover::None;
    }
    if prev_macd < prev_signal && macd > signal {
        Crossover::Bullish
    } else if prev_macd > prev_signal && macd < signal {
        Crossover::Bearish
    } else {
        Crossover::None
    }
}
