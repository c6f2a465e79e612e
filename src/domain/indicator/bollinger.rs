//! Bollinger Bands.
//!
//! middle = SMA(close, n); upper/lower = middle ± k·stddev(close, n).
//! The deviation is the sample standard deviation (n-1 divisor), matching
//! the rolling-window convention the band parameters were tuned against.
//! NaN until the window fills.

pub struct BollingerSeries {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger(closes: &[f64], period: usize, stddev_mult: f64) -> BollingerSeries {
    let len = closes.len();
    let mut upper = vec![f64::NAN; len];
    let mut middle = vec![f64::NAN; len];
    let mut lower = vec![f64::NAN; len];

    if period == 0 {
        return BollingerSeries { upper, middle, lower };
    }

    for i in (period - 1)..len {
        let window = &closes[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let stddev = sample_stddev(window, mean);
        middle[i] = mean;
        upper[i] = mean + stddev_mult * stddev;
        lower[i] = mean - stddev_mult * stddev;
    }

    BollingerSeries { upper, middle, lower }
}

fn sample_stddev(window: &[f64], mean: f64) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = window.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum_sq / (window.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bands_nan_during_warmup() {
        let out = bollinger(&[10.0, 11.0, 12.0, 13.0], 3, 2.0);
        assert!(out.middle[0].is_nan());
        assert!(out.middle[1].is_nan());
        assert!(!out.middle[2].is_nan());
    }

    #[test]
    fn middle_is_sma() {
        let out = bollinger(&[10.0, 20.0, 30.0], 3, 2.0);
        assert_relative_eq!(out.middle[2], 20.0);
    }

    #[test]
    fn bands_use_sample_stddev() {
        // Window [10, 20, 30]: mean 20, sample variance (100+0+100)/2 = 100.
        let out = bollinger(&[10.0, 20.0, 30.0], 3, 2.0);
        assert_relative_eq!(out.upper[2], 20.0 + 2.0 * 10.0);
        assert_relative_eq!(out.lower[2], 20.0 - 2.0 * 10.0);
    }

    #[test]
    fn bands_collapse_on_flat_prices() {
        let out = bollinger(&[50.0; 6], 4, 2.0);
        let last = out.upper.len() - 1;
        assert_relative_eq!(out.upper[last], 50.0);
        assert_relative_eq!(out.lower[last], 50.0);
    }

    #[test]
    fn upper_above_lower() {
        let closes = [10.0, 14.0, 9.0, 15.0, 12.0, 16.0];
        let out = bollinger(&closes, 4, 2.0);
        for i in 3..closes.len() {
            assert!(out.upper[i] >= out.middle[i]);
            assert!(out.middle[i] >= out.lower[i]);
        }
    }
}
