use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::models::Candle;

/// Price path shapes for synthetic feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketScenario {
    /// Upward drift with small noise
    Uptrend,
    /// Downward drift with small noise
    Downtrend,
    /// Mean-reverting chop around the base price
    Sideways,
    /// Large random swings
    Volatile,
    /// Gentle rise, then a sharp sell-off in the second half
    Crash,
}

/// Deterministic candle generator; the same seed always yields the same series
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
}

impl SyntheticDataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 100.0,
            base_volume: 50.0,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate `num_candles` final candles spaced `interval` apart from `start`
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_candles: usize,
        start: DateTime<Utc>,
        interval: Duration,
    ) -> Vec<Candle> {
        let base = self.base_price;
        let mut price = base;
        let mut candles = Vec::with_capacity(num_candles);

        for i in 0..num_candles {
            let step = match scenario {
                MarketScenario::Uptrend => price * (0.0008 + self.rng.gen_range(-0.002..0.002)),
                MarketScenario::Downtrend => price * (-0.0008 + self.rng.gen_range(-0.002..0.002)),
                MarketScenario::Sideways => {
                    (base - price) * 0.1 + price * self.rng.gen_range(-0.004..0.004)
                }
                MarketScenario::Volatile => price * self.rng.gen_range(-0.02..0.02),
                MarketScenario::Crash if i < num_candles / 2 => {
                    price * self.rng.gen_range(-0.002..0.004)
                }
                MarketScenario::Crash => {
                    let drop_rate = -0.25 / (num_candles as f64 / 2.0);
                    price * (drop_rate + self.rng.gen_range(-0.002..0.002))
                }
            };

            // Keep prices strictly positive
            price = (price + step).max(base * 0.1);

            let timestamp = start + interval * i as i32;
            candles.push(self.create_candle(price, timestamp));
        }

        candles
    }

    /// Wrap a close price in a plausible OHLC bar
    fn create_candle(&mut self, close: f64, timestamp: DateTime<Utc>) -> Candle {
        let wick = 0.002;
        let high = close * (1.0 + self.rng.gen_range(0.0..wick));
        let low = close * (1.0 - self.rng.gen_range(0.0..wick));
        let open = (close * (1.0 + self.rng.gen_range(-wick..wick))).clamp(low, high);

        Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume: self.base_volume * self.rng.gen_range(0.7..1.3),
            is_final: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    #[test]
    fn test_generate_uptrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Uptrend, 500, start(), Duration::minutes(1));

        assert_eq!(candles.len(), 500);
        let first = candles.first().unwrap().close;
        let last = candles.last().unwrap().close;
        assert!(last > first, "Uptrend should end higher: {} -> {}", first, last);
    }

    #[test]
    fn test_generate_downtrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Downtrend, 500, start(), Duration::minutes(1));

        let first = candles.first().unwrap().close;
        let last = candles.last().unwrap().close;
        assert!(last < first, "Downtrend should end lower: {} -> {}", first, last);
    }

    #[test]
    fn test_generate_sideways_stays_near_base() {
        let mut gen = SyntheticDataGenerator::new(7);
        let base = gen.base_price();
        let candles = gen.generate(MarketScenario::Sideways, 500, start(), Duration::minutes(1));

        for candle in &candles {
            assert!(
                candle.close > base * 0.9 && candle.close < base * 1.1,
                "Sideways should stay near base: {} vs {}",
                candle.close,
                base
            );
        }
    }

    #[test]
    fn test_crash_ends_well_below_peak() {
        let mut gen = SyntheticDataGenerator::new(3);
        let candles = gen.generate(MarketScenario::Crash, 200, start(), Duration::minutes(1));

        let peak = candles.iter().map(|c| c.close).fold(f64::MIN, f64::max);
        assert!(candles.last().unwrap().close < peak * 0.85);
    }

    #[test]
    fn test_same_seed_same_series() {
        let a = SyntheticDataGenerator::new(11).generate(MarketScenario::Volatile, 50, start(), Duration::minutes(1));
        let b = SyntheticDataGenerator::new(11).generate(MarketScenario::Volatile, 50, start(), Duration::minutes(1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_candles_are_final_sequential_and_consistent() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Volatile, 100, start(), Duration::minutes(5));

        for pair in candles.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::minutes(5));
        }
        for candle in &candles {
            assert!(candle.is_final);
            assert!(candle.is_well_formed());
            assert!(candle.high >= candle.close && candle.high >= candle.open);
            assert!(candle.low <= candle.close && candle.low <= candle.open);
        }
    }
}
