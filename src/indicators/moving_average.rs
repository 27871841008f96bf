/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA)
///
/// Seeded with the simple average of the first `period` prices, then
/// `ema = prev + (2 / (period + 1)) * (price - prev)` for every later price.
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = calculate_sma(&prices[..period], period)?;

    Some(
        prices[period..]
            .iter()
            .fold(seed, |ema, price| ema + multiplier * (price - ema)),
    )
}
