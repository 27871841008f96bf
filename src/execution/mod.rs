// Candle processing, position tracking and the live loops around them
pub mod candle_buffer;
pub mod engine;
pub mod heartbeat;
pub mod position_manager;
pub mod price_feed;

pub use candle_buffer::{CandleBuffer, HistoryView};
pub use engine::{CandleOutcome, EngineStatus, ExecutedSignal, SharedEngine, SkipReason, TradingEngine};
pub use heartbeat::HeartbeatScheduler;
pub use position_manager::{ClosedTrade, Ledger, OpenPosition, PositionManager, PositionState};
pub use price_feed::{Backoff, FeedEvent, PriceFeed};
