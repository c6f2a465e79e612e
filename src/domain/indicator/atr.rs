//! ATR (Average True Range).
//!
//! TR[i] = max(high-low, |high-prev_close|, |low-prev_close|); the first
//! bar has no previous close so TR[0] = high-low. ATR = SMA(TR, n),
//! NaN until the window fills.

use crate::domain::candle::Candle;

pub fn atr(candles: &[Candle], period: usize) -> Vec<f64> {
    let len = candles.len();
    let mut out = vec![f64::NAN; len];
    if period == 0 || len == 0 {
        return out;
    }

    let mut tr = Vec::with_capacity(len);
    tr.push(candles[0].high - candles[0].low);
    for i in 1..len {
        tr.push(candles[i].true_range(candles[i - 1].close));
    }

    for i in (period - 1)..len {
        out[i] = tr[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn candle(high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: 0,
            open: close,
            high,
            low,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn first_bar_uses_high_minus_low() {
        let candles = vec![candle(110.0, 90.0, 100.0)];
        let out = atr(&candles, 1);
        assert_relative_eq!(out[0], 20.0);
    }

    #[test]
    fn atr_nan_during_warmup() {
        let candles = vec![
            candle(110.0, 90.0, 100.0),
            candle(112.0, 95.0, 105.0),
            candle(115.0, 100.0, 110.0),
        ];
        let out = atr(&candles, 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!(!out[2].is_nan());
    }

    #[test]
    fn atr_is_mean_of_true_ranges() {
        let candles = vec![
            candle(110.0, 90.0, 100.0),  // TR = 20
            candle(112.0, 95.0, 105.0),  // TR = max(17, 12, 5) = 17
            candle(130.0, 108.0, 120.0), // TR = max(22, 25, 3) = 25
        ];
        let out = atr(&candles, 3);
        assert_relative_eq!(out[2], (20.0 + 17.0 + 25.0) / 3.0);
    }

    #[test]
    fn atr_gap_down_dominated_by_prev_close() {
        let candles = vec![
            candle(110.0, 90.0, 100.0), // TR = 20
            candle(80.0, 70.0, 75.0),   // TR = max(10, 20, 30) = 30
        ];
        let out = atr(&candles, 2);
        assert_relative_eq!(out[1], 25.0);
    }
}
