use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

use super::candle_buffer::CandleBuffer;
use super::position_manager::{ClosedTrade, Ledger, PositionManager, PositionState};
use crate::indicators::IndicatorEngine;
use crate::models::{Candle, IndicatorSnapshot, SignalEvent, SignalKind};
use crate::strategy::{evaluate, CooldownClock, EvaluationInput, SignalConfig};
use crate::Result;

/// Why a candle was not fed into the history buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Forming,
    Malformed,
    Duplicate,
}

/// A signal that has been applied to the position state
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedSignal {
    pub event: SignalEvent,
    pub trade: Option<ClosedTrade>, // Set for exits
    pub capital: f64,               // Ledger capital after applying the signal
}

/// Result of handing one candle update to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum CandleOutcome {
    Ignored(SkipReason),
    Collecting { have: usize, need: usize },
    Evaluated {
        snapshot: IndicatorSnapshot,
        signal: Option<ExecutedSignal>,
    },
}

impl CandleOutcome {
    pub fn signal(&self) -> Option<&ExecutedSignal> {
        match self {
            CandleOutcome::Evaluated { signal, .. } => signal.as_ref(),
            _ => None,
        }
    }
}

/// Consistent read of the engine state for status messages
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub symbol: String,
    pub last_close: Option<f64>,
    pub snapshot: IndicatorSnapshot,
    pub position: PositionState,
    pub ledger: Ledger,
    pub equity: f64,
    pub history_len: usize,
    pub warmup_len: usize,
    pub trades: usize,
}

/// Single owner of the per-instrument trading state
///
/// Holds the history buffer, position and ledger, cooldown clock and the
/// hold-message marker. Every mutation goes through `on_candle`, `seed` or
/// `mark_activity`.
#[derive(Debug)]
pub struct TradingEngine {
    symbol: String,
    config: SignalConfig,
    indicators: IndicatorEngine,
    buffer: CandleBuffer,
    positions: PositionManager,
    cooldown: CooldownClock,
    last_activity: DateTime<Utc>,
    last_snapshot: IndicatorSnapshot,
}

impl TradingEngine {
    pub fn new(
        symbol: impl Into<String>,
        config: SignalConfig,
        initial_capital: f64,
        commission_rate: f64,
        history_margin: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let capacity = config.history_capacity(history_margin);
        Self {
            symbol: symbol.into(),
            indicators: IndicatorEngine::new(config.periods()),
            buffer: CandleBuffer::new(capacity),
            positions: PositionManager::new(initial_capital, commission_rate),
            cooldown: CooldownClock::new(),
            last_activity: now,
            last_snapshot: IndicatorSnapshot::not_ready(),
            config,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    pub fn buffer(&self) -> &CandleBuffer {
        &self.buffer
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    pub fn cooldown(&self) -> &CooldownClock {
        &self.cooldown
    }

    pub fn is_flat(&self) -> bool {
        self.positions.is_flat()
    }

    pub fn last_snapshot(&self) -> IndicatorSnapshot {
        self.last_snapshot
    }

    /// Time of the last signal, hold message or feed (re)connect
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn mark_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// Fill the history buffer with backfilled candles without evaluating
    ///
    /// Returns how many candles were accepted.
    pub fn seed(&mut self, candles: &[Candle]) -> usize {
        let mut seeded = 0;
        for candle in candles {
            if self.accept(candle).is_ok() {
                self.buffer.append(candle);
                seeded += 1;
            }
        }

        self.last_snapshot = self.indicators.compute(&self.buffer.view());

        tracing::info!(
            symbol = %self.symbol,
            seeded,
            history = self.buffer.len(),
            warmup = self.indicators.warmup_len(),
            ready = self.last_snapshot.ready,
            "Seeded history buffer"
        );

        seeded
    }

    /// Process one candle update from the feed
    ///
    /// Only final, well-formed candles newer than the last appended one are
    /// buffered; anything else leaves the state untouched.
    pub fn on_candle(&mut self, candle: &Candle, now: DateTime<Utc>) -> CandleOutcome {
        if let Err(reason) = self.accept(candle) {
            match reason {
                SkipReason::Forming => {}
                SkipReason::Malformed => {
                    tracing::warn!(symbol = %self.symbol, ?candle, "Dropped malformed candle")
                }
                SkipReason::Duplicate => tracing::warn!(
                    symbol = %self.symbol,
                    timestamp = %candle.timestamp,
                    "Dropped duplicate candle"
                ),
            }
            return CandleOutcome::Ignored(reason);
        }

        self.buffer.append(candle);
        let view = self.buffer.view();
        let snapshot = self.indicators.compute(&view);
        self.last_snapshot = snapshot;

        if !snapshot.ready {
            let (have, need) = (self.buffer.len(), self.indicators.warmup_len());
            tracing::info!(symbol = %self.symbol, "Collecting data ({}/{})", have, need);
            return CandleOutcome::Collecting { have, need };
        }

        let previous_close = view.previous_close().unwrap_or(candle.close);
        self.log_diagnostics(candle.close, previous_close, &snapshot);

        let event = evaluate(
            &self.config,
            &EvaluationInput {
                position: self.positions.state(),
                snapshot,
                close: candle.close,
                previous_close,
                cooldown: &self.cooldown,
                commission_rate: self.positions.commission_rate(),
                now,
            },
        );

        let signal = event.and_then(|event| self.apply(event, now));
        CandleOutcome::Evaluated { snapshot, signal }
    }

    pub fn status(&self) -> EngineStatus {
        let last_close = self.buffer.last_close();
        EngineStatus {
            symbol: self.symbol.clone(),
            last_close,
            snapshot: self.last_snapshot,
            position: self.positions.state().clone(),
            ledger: self.positions.ledger(),
            equity: last_close
                .map(|price| self.positions.mark_to_market(price))
                .unwrap_or(self.positions.ledger().current_capital),
            history_len: self.buffer.len(),
            warmup_len: self.indicators.warmup_len(),
            trades: self.positions.closed_trades().len(),
        }
    }

    fn accept(&self, candle: &Candle) -> std::result::Result<(), SkipReason> {
        if !candle.is_final {
            return Err(SkipReason::Forming);
        }
        if !candle.is_well_formed() {
            return Err(SkipReason::Malformed);
        }
        match self.buffer.last_timestamp() {
            Some(last) if candle.timestamp <= last => Err(SkipReason::Duplicate),
            _ => Ok(()),
        }
    }

    fn apply(&mut self, event: SignalEvent, now: DateTime<Utc>) -> Option<ExecutedSignal> {
        let trade = match event.kind {
            SignalKind::Buy => match self.positions.open_position(event.price, now) {
                Ok(_) => None,
                Err(e) => {
                    tracing::error!(symbol = %self.symbol, "Failed to open position: {}", e);
                    return None;
                }
            },
            SignalKind::Sell => {
                match self.positions.close_position(event.price, now, event.reason) {
                    Ok(trade) => Some(trade),
                    Err(e) => {
                        tracing::error!(symbol = %self.symbol, "Failed to close position: {}", e);
                        return None;
                    }
                }
            }
        };

        self.cooldown.reset(now);
        self.last_activity = now;

        tracing::info!(
            symbol = %self.symbol,
            kind = %event.kind,
            reason = %event.reason,
            price = event.price,
            "Signal fired"
        );

        Some(ExecutedSignal {
            event,
            trade,
            capital: self.positions.ledger().current_capital,
        })
    }

    fn log_diagnostics(&self, close: f64, previous_close: f64, snapshot: &IndicatorSnapshot) {
        let position = match self.positions.state() {
            PositionState::Flat => "FLAT".to_string(),
            PositionState::Long(p) => format!(
                "LONG @ {:.4} ({:+.2}%)",
                p.entry_price,
                p.net_pnl_pct(close, self.positions.commission_rate())
            ),
        };

        tracing::info!(
            symbol = %self.symbol,
            "Price: {:.4} (prev {:.4}) | EMA{}: {:.4} | EMA{}: {:.4} | RSI: {:.2} | ATR: {:.4} | EMA diff: {:.4} (min {:.4}) | {}",
            close,
            previous_close,
            self.config.ema_short_period,
            snapshot.ema_short,
            self.config.ema_long_period,
            snapshot.ema_long,
            snapshot.rsi,
            snapshot.atr,
            snapshot.ema_spread(),
            snapshot.atr * self.config.ema_separation_multiplier,
            position
        );
    }
}

/// Mutex-guarded handle shared by the feed loop and the heartbeat timers
///
/// Each closure runs with exclusive access, so no reader ever sees a
/// half-applied candle evaluation.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<TradingEngine>>,
}

impl SharedEngine {
    pub fn new(engine: TradingEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut TradingEngine) -> R) -> Result<R> {
        let mut engine = self
            .inner
            .lock()
            .map_err(|e| format!("Trading engine lock poisoned: {}", e))?;
        Ok(f(&mut engine))
    }

    pub fn status(&self) -> Result<EngineStatus> {
        self.with(|engine| engine.status())
    }
}
