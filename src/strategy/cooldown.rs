use chrono::{DateTime, Utc};

/// Tracks when the last trading signal fired
///
/// Entries are gated by the time elapsed since that signal; exits are not.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CooldownClock {
    last_signal_time: Option<DateTime<Utc>>,
}

impl CooldownClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_signal_time(&self) -> Option<DateTime<Utc>> {
        self.last_signal_time
    }

    /// True once at least `cooldown_ms` has passed since the last signal
    ///
    /// Always true before the first signal. A clock that moved backwards
    /// counts as not elapsed.
    pub fn entry_allowed(&self, now: DateTime<Utc>, cooldown_ms: u64) -> bool {
        match self.last_signal_time {
            None => true,
            Some(last) => {
                let elapsed = now.signed_duration_since(last).num_milliseconds();
                elapsed >= 0 && elapsed as u64 >= cooldown_ms
            }
        }
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.last_signal_time = Some(now);
    }
}
