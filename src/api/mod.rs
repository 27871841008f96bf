pub mod binance;

pub use binance::{BinanceClient, KlineEvent, KlinePayload};
