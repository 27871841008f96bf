use super::{calculate_atr, calculate_ema, calculate_rsi};
use crate::execution::candle_buffer::HistoryView;
use crate::models::IndicatorSnapshot;

/// Indicator periods used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorPeriods {
    pub ema_short: usize,
    pub ema_long: usize,
    pub rsi: usize,
    pub atr: usize,
}

impl IndicatorPeriods {
    /// Minimum history length before every indicator is numerically valid
    ///
    /// EMA needs `period` closes, RSI and ATR need `period + 1`.
    pub fn warmup_len(&self) -> usize {
        self.ema_short
            .max(self.ema_long)
            .max(self.rsi + 1)
            .max(self.atr + 1)
    }

    /// Longest configured period, the base of the history capacity
    pub fn longest(&self) -> usize {
        self.ema_short.max(self.ema_long).max(self.rsi).max(self.atr)
    }
}

/// Computes EMA(short), EMA(long), RSI and ATR from the history buffer
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    periods: IndicatorPeriods,
}

impl IndicatorEngine {
    pub fn new(periods: IndicatorPeriods) -> Self {
        Self { periods }
    }

    pub fn periods(&self) -> IndicatorPeriods {
        self.periods
    }

    pub fn warmup_len(&self) -> usize {
        self.periods.warmup_len()
    }

    /// Recompute every indicator from the buffer contents
    ///
    /// Returns a zeroed, not-ready snapshot until the history reaches the
    /// warm-up length.
    pub fn compute(&self, history: &HistoryView<'_>) -> IndicatorSnapshot {
        if history.len() < self.warmup_len() {
            return IndicatorSnapshot::not_ready();
        }

        let values = (
            calculate_ema(history.closes, self.periods.ema_short),
            calculate_ema(history.closes, self.periods.ema_long),
            calculate_rsi(history.closes, self.periods.rsi),
            calculate_atr(history.highs, history.lows, history.closes, self.periods.atr),
        );

        match values {
            (Some(ema_short), Some(ema_long), Some(rsi), Some(atr)) => IndicatorSnapshot {
                ema_short,
                ema_long,
                rsi,
                atr,
                ready: true,
            },
            _ => IndicatorSnapshot::not_ready(),
        }
    }
}
