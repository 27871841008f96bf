// Technical indicators module
// Implements EMA, RSI, ATR and the snapshot engine built on top of them

pub mod atr;
pub mod engine;
pub mod moving_average;
pub mod rsi;

pub use atr::{calculate_atr, true_ranges};
pub use engine::{IndicatorEngine, IndicatorPeriods};
pub use moving_average::{calculate_ema, calculate_sma};
pub use rsi::calculate_rsi;
