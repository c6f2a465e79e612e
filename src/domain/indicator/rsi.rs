//! RSI (Relative Strength Index), simple-moving-average variant.
//!
//! Per-bar delta; gains = max(delta, 0), losses = max(-delta, 0); plain
//! rolling mean of gains and losses over the window (NOT Wilder smoothing).
//! RSI = 100 - 100/(1 + avg_gain/avg_loss).
//!
//! Edge case, by contract not an error: avg_loss == 0 with avg_gain > 0
//! saturates RSI at 100 (rs → +inf). Both averages zero leaves the value
//! undefined (NaN), which callers treat as insufficient data.
//!
//! Undefined (NaN) until `period` deltas exist, i.e. the first `period`
//! bars carry NaN.

pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; closes.len()];
    if period == 0 || closes.len() < 2 {
        return out;
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);
    for window in closes.windows(2) {
        let delta = window[1] - window[0];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    for i in period..closes.len() {
        // Deltas for bars (i-period+1)..=i live at indices (i-period)..i.
        let start = i - period;
        let avg_gain: f64 = gains[start..i].iter().sum::<f64>() / period as f64;
        let avg_loss: f64 = losses[start..i].iter().sum::<f64>() / period as f64;

        out[i] = if avg_loss == 0.0 && avg_gain > 0.0 {
            100.0
        } else if avg_loss == 0.0 {
            f64::NAN
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        };
    }

    out
}
