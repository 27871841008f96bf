use crate::indicators::IndicatorPeriods;
use crate::settings::ConfigError;
use serde::{Deserialize, Serialize};

/// Named strategy variants
///
/// Each preset is just a `SignalConfig`; individual thresholds can still be
/// overridden on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Fast EMA 5/21 trend follower with ATR-scaled confirmation and a tight stop
    #[default]
    Aggressive,
    /// Slower EMA 10/21 variant with a wide stop and a fixed profit target
    Classic,
}

/// Configuration for signal generation
///
/// Percentages are expressed in percent (0.7 means 0.7 %).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub ema_short_period: usize,
    pub ema_long_period: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub cooldown_ms: u64, // Minimum time between an entry and the previous signal
    pub rsi_entry_lower: f64,
    pub rsi_entry_upper: f64,
    pub rsi_exit_lower: f64, // Validated with the band, unused until short positions exist
    pub rsi_exit_upper: f64,
    pub entry_price_multiplier: f64, // x ATR the close must rise above the previous close
    pub exit_price_multiplier: f64,  // x ATR the close must fall below the previous close
    pub ema_separation_multiplier: f64, // x ATR the EMAs must be apart
    pub stop_loss_pct: f64,
    pub min_profit_target_pct: Option<f64>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self::preset(Preset::Aggressive)
    }
}

impl SignalConfig {
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Aggressive => Self {
                ema_short_period: 5,
                ema_long_period: 21,
                rsi_period: 14,
                atr_period: 7,
                cooldown_ms: 10_000,
                rsi_entry_lower: 40.0,
                rsi_entry_upper: 75.0,
                rsi_exit_lower: 25.0,
                rsi_exit_upper: 80.0,
                entry_price_multiplier: 0.5,
                exit_price_multiplier: 0.5,
                ema_separation_multiplier: 0.05,
                stop_loss_pct: 0.7,
                min_profit_target_pct: None,
            },
            Preset::Classic => Self {
                ema_short_period: 10,
                ema_long_period: 21,
                rsi_period: 14,
                atr_period: 14,
                cooldown_ms: 60_000,
                rsi_entry_lower: 0.0,
                rsi_entry_upper: 65.0,
                rsi_exit_lower: 0.0,
                rsi_exit_upper: 75.0,
                entry_price_multiplier: 0.0,
                exit_price_multiplier: 0.0,
                ema_separation_multiplier: 0.0,
                stop_loss_pct: 5.0,
                min_profit_target_pct: Some(1.0),
            },
        }
    }

    pub fn periods(&self) -> IndicatorPeriods {
        IndicatorPeriods {
            ema_short: self.ema_short_period,
            ema_long: self.ema_long_period,
            rsi: self.rsi_period,
            atr: self.atr_period,
        }
    }

    /// Minimum history length before the evaluator can run
    pub fn warmup_len(&self) -> usize {
        self.periods().warmup_len()
    }

    /// History buffer capacity: longest period plus a safety margin
    pub fn history_capacity(&self, margin: usize) -> usize {
        self.periods().longest() + margin
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self, history_margin: usize) -> Result<(), ConfigError> {
        let periods = [
            ("ema_short_period", self.ema_short_period),
            ("ema_long_period", self.ema_long_period),
            ("rsi_period", self.rsi_period),
            ("atr_period", self.atr_period),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(ConfigError::NonPositivePeriod(name));
            }
        }

        if self.ema_short_period >= self.ema_long_period {
            return Err(ConfigError::Invalid(format!(
                "ema_short_period ({}) must be below ema_long_period ({})",
                self.ema_short_period, self.ema_long_period
            )));
        }

        check_band("rsi_entry", self.rsi_entry_lower, self.rsi_entry_upper)?;
        check_band("rsi_exit", self.rsi_exit_lower, self.rsi_exit_upper)?;

        let thresholds = [
            ("entry_price_multiplier", self.entry_price_multiplier),
            ("exit_price_multiplier", self.exit_price_multiplier),
            ("ema_separation_multiplier", self.ema_separation_multiplier),
            ("stop_loss_pct", self.stop_loss_pct),
            (
                "min_profit_target_pct",
                self.min_profit_target_pct.unwrap_or(0.0),
            ),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        let capacity = self.history_capacity(history_margin);
        let warmup = self.warmup_len();
        if capacity < warmup {
            return Err(ConfigError::UnreachableWarmup { capacity, warmup });
        }

        Ok(())
    }
}

fn check_band(name: &'static str, lower: f64, upper: f64) -> Result<(), ConfigError> {
    let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
    if !in_range(lower) || !in_range(upper) || lower > upper {
        return Err(ConfigError::InvalidBand { name, lower, upper });
    }
    Ok(())
}
