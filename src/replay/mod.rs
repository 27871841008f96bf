// Offline replay of candle series through the live engine
pub mod runner;
pub mod synthetic;

pub use runner::{ReplayReport, ReplayRunner};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
