use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::engine::{EngineStatus, SharedEngine, TradingEngine};
use crate::clock::Clock;
use crate::notify::messages::{hold_message, status_message};
use crate::notify::Notifier;
use crate::Result;

const HOLD_CHECK_PERIOD: Duration = Duration::from_secs(1);

/// Fire the hold message if nothing happened for `hold_interval` while flat
///
/// Resets the activity marker when it fires.
pub fn hold_due(
    engine: &mut TradingEngine,
    now: DateTime<Utc>,
    hold_interval: Duration,
) -> Option<EngineStatus> {
    let elapsed = now.signed_duration_since(engine.last_activity());
    let due = elapsed.to_std().map(|e| e >= hold_interval).unwrap_or(false);

    if due && engine.is_flat() {
        engine.mark_activity(now);
        Some(engine.status())
    } else {
        None
    }
}

/// Periodic status and hold messages, independent of candle arrival
pub struct HeartbeatScheduler {
    engine: SharedEngine,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    status_interval: Duration,
    hold_interval: Duration,
}

impl HeartbeatScheduler {
    pub fn new(
        engine: SharedEngine,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        status_interval: Duration,
        hold_interval: Duration,
    ) -> Self {
        Self {
            engine,
            notifier,
            clock,
            status_interval,
            hold_interval,
        }
    }

    /// Queue the status message
    pub fn status_tick(&self) -> Result<()> {
        let status = self.engine.status()?;
        self.notifier.notify(status_message(&status));
        Ok(())
    }

    /// Queue the hold message if it is due; returns whether it fired
    pub fn hold_tick(&self) -> Result<bool> {
        let now = self.clock.now();
        let hold_interval = self.hold_interval;
        let fired = self
            .engine
            .with(|engine| hold_due(engine, now, hold_interval))?;

        match fired {
            Some(status) => {
                self.notifier.notify(hold_message(&status));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn run(self) {
        let mut status_ticker =
            interval_at(Instant::now() + self.status_interval, self.status_interval);
        status_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let check_period = self.hold_interval.min(HOLD_CHECK_PERIOD);
        let mut hold_ticker = interval_at(Instant::now() + check_period, check_period);
        hold_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            status_secs = self.status_interval.as_secs(),
            hold_secs = self.hold_interval.as_secs(),
            "💓 Heartbeat started"
        );

        loop {
            let result = tokio::select! {
                _ = status_ticker.tick() => self.status_tick(),
                _ = hold_ticker.tick() => self.hold_tick().map(|_| ()),
            };

            if let Err(e) = result {
                tracing::error!("Heartbeat stopped: {}", e);
                break;
            }
        }
    }
}
