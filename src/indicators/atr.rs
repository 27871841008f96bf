//! Average True Range (ATR) indicator
//!
//! True Range is the greatest of:
//! - Current High - Current Low
//! - Abs(Current High - Previous Close)
//! - Abs(Current Low - Previous Close)
//!
//! The first ATR is the simple mean of the first `period` true ranges,
//! later values use Wilder's smoothing.

/// True range of every candle that has a predecessor
///
/// The three slices are parallel; the result has `len - 1` entries.
pub fn true_ranges(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    let len = highs.len().min(lows.len()).min(closes.len());

    (1..len)
        .map(|i| {
            let prev_close = closes[i - 1];
            (highs[i] - lows[i])
                .max((highs[i] - prev_close).abs())
                .max((lows[i] - prev_close).abs())
        })
        .collect()
}

/// Calculate the current ATR, or None with fewer than `period + 1` candles
pub fn calculate_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    let ranges = true_ranges(highs, lows, closes);
    if period == 0 || ranges.len() < period {
        return None;
    }

    let p = period as f64;
    let first_atr = ranges[..period].iter().sum::<f64>() / p;

    Some(
        ranges[period..]
            .iter()
            .fold(first_atr, |atr, tr| (atr * (p - 1.0) + tr) / p),
    )
}
