use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV candlestick for the tracked instrument
///
/// `is_final` is false while the candle is still forming; only final candles
/// are fed into the history buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>, // Candle open time
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_final: bool,
}

impl Candle {
    /// True when every OHLC value is a finite number
    pub fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Indicator values derived from the history buffer at one point in time
///
/// While `ready` is false every value is zero; a snapshot never carries
/// values from an earlier computation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct IndicatorSnapshot {
    pub ema_short: f64,
    pub ema_long: f64,
    pub rsi: f64,
    pub atr: f64,
    pub ready: bool,
}

impl IndicatorSnapshot {
    pub fn not_ready() -> Self {
        Self::default()
    }

    /// Absolute distance between the short and long EMA
    pub fn ema_spread(&self) -> f64 {
        (self.ema_short - self.ema_long).abs()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SignalKind {
    Buy,
    Sell,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
        }
    }
}

/// Why a signal fired
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SignalReason {
    /// All entry filters passed (trend, RSI band, price confirmation, EMA separation)
    TrendEntry,
    StopLoss,
    EmaReversal,
    RsiReversal,
    MomentumLoss,
    ProfitTarget,
}

impl fmt::Display for SignalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SignalReason::TrendEntry => "trend entry",
            SignalReason::StopLoss => "stop-loss",
            SignalReason::EmaReversal => "EMA reversal",
            SignalReason::RsiReversal => "RSI reversal",
            SignalReason::MomentumLoss => "momentum loss",
            SignalReason::ProfitTarget => "profit target",
        };
        f.write_str(text)
    }
}

/// A trading decision handed to the notification sink
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalEvent {
    pub kind: SignalKind,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub reason: SignalReason,
    pub snapshot: IndicatorSnapshot,
}
