//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the first value, then
//! EMA[i] = x[i]*k + EMA[i-1]*(1-k). Defined from the first bar onward.

/// EMA over an arbitrary value series (closes, MACD line, ...).
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = f64::NAN;

    for (i, &value) in values.iter().enumerate() {
        let current = if i == 0 {
            value
        } else {
            value * k + prev * (1.0 - k)
        };
        out.push(current);
        prev = current;
    }

    out
}
