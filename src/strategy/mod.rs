// Trading strategy module
pub mod cooldown;
pub mod evaluator;
pub mod signals;

pub use cooldown::CooldownClock;
pub use evaluator::{evaluate, EvaluationInput};
pub use signals::{Preset, SignalConfig};
