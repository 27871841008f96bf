use chrono::{DateTime, Utc};

use super::{CooldownClock, SignalConfig};
use crate::execution::position_manager::{OpenPosition, PositionState};
use crate::models::{IndicatorSnapshot, SignalEvent, SignalKind, SignalReason};

/// Everything the evaluator looks at for one closed candle
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub position: &'a PositionState,
    pub snapshot: IndicatorSnapshot,
    pub close: f64,
    pub previous_close: f64,
    pub cooldown: &'a CooldownClock,
    pub commission_rate: f64,
    pub now: DateTime<Utc>,
}

/// Decide whether the closed candle produces a signal
///
/// Only the rule matching the current position state runs: the entry rule
/// while flat, the exit rule while long. Returns at most one event and never
/// mutates anything; applying the decision is up to the caller.
pub fn evaluate(config: &SignalConfig, input: &EvaluationInput<'_>) -> Option<SignalEvent> {
    if !input.snapshot.ready {
        return None;
    }

    let reason = match input.position {
        PositionState::Flat => check_entry(config, input),
        PositionState::Long(position) => check_exit(config, input, position),
    }?;

    let kind = match reason {
        SignalReason::TrendEntry => SignalKind::Buy,
        _ => SignalKind::Sell,
    };

    Some(SignalEvent {
        kind,
        price: input.close,
        timestamp: input.now,
        reason,
        snapshot: input.snapshot,
    })
}

fn check_entry(config: &SignalConfig, input: &EvaluationInput<'_>) -> Option<SignalReason> {
    if !input.cooldown.entry_allowed(input.now, config.cooldown_ms) {
        return None;
    }

    let snap = &input.snapshot;
    let bullish = snap.ema_short > snap.ema_long;
    let rsi_in_band = snap.rsi >= config.rsi_entry_lower && snap.rsi <= config.rsi_entry_upper;
    let price_confirmed =
        input.close > input.previous_close + snap.atr * config.entry_price_multiplier;
    let trend_strong = snap.ema_spread() > snap.atr * config.ema_separation_multiplier;

    (bullish && rsi_in_band && price_confirmed && trend_strong).then_some(SignalReason::TrendEntry)
}

fn check_exit(
    config: &SignalConfig,
    input: &EvaluationInput<'_>,
    position: &OpenPosition,
) -> Option<SignalReason> {
    let snap = &input.snapshot;
    let net_pnl_pct = position.net_pnl_pct(input.close, input.commission_rate);
    let profitable = net_pnl_pct > 0.0;
    let falling = input.close < input.previous_close;

    if net_pnl_pct <= -config.stop_loss_pct {
        return Some(SignalReason::StopLoss);
    }

    if snap.ema_short < snap.ema_long {
        return Some(SignalReason::EmaReversal);
    }

    // Only the upper bound closes a long; an oversold reading is not a reversal
    let rsi_breach = snap.rsi > config.rsi_exit_upper;
    if rsi_breach && falling && profitable {
        return Some(SignalReason::RsiReversal);
    }

    let momentum_lost = input.close < input.previous_close - snap.atr * config.exit_price_multiplier;
    if momentum_lost && profitable {
        return Some(SignalReason::MomentumLoss);
    }

    match config.min_profit_target_pct {
        Some(target) if net_pnl_pct >= target => Some(SignalReason::ProfitTarget),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::days(1)
    }

    fn bullish_snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            ema_short: 101.0,
            ema_long: 100.0,
            rsi: 60.0,
            atr: 1.0,
            ready: true,
        }
    }

    fn long_at(entry_price: f64, commission: f64) -> PositionState {
        PositionState::Long(OpenPosition {
            id: Uuid::new_v4(),
            entry_price,
            cost_basis_per_unit: entry_price * (1.0 + commission),
            position_value: 1000.0,
            entry_time: now() - Duration::minutes(5),
        })
    }

    fn input<'a>(
        position: &'a PositionState,
        cooldown: &'a CooldownClock,
        snapshot: IndicatorSnapshot,
        close: f64,
        previous_close: f64,
    ) -> EvaluationInput<'a> {
        EvaluationInput {
            position,
            snapshot,
            close,
            previous_close,
            cooldown,
            commission_rate: 0.0,
            now: now(),
        }
    }

    #[test]
    fn test_not_ready_never_signals() {
        let config = SignalConfig::default();
        let flat = PositionState::Flat;
        let cooldown = CooldownClock::new();
        let snapshot = IndicatorSnapshot {
            ready: false,
            ..bullish_snapshot()
        };

        assert!(evaluate(&config, &input(&flat, &cooldown, snapshot, 110.0, 100.0)).is_none());

        let long = long_at(200.0, 0.0);
        assert!(evaluate(&config, &input(&long, &cooldown, snapshot, 100.0, 100.0)).is_none());
    }

    #[test]
    fn test_entry_fires_when_all_filters_pass() {
        let config = SignalConfig::default();
        let flat = PositionState::Flat;
        let cooldown = CooldownClock::new();

        // 100.6 > 100.0 + 1.0 * 0.5
        let event = evaluate(&config, &input(&flat, &cooldown, bullish_snapshot(), 100.6, 100.0))
            .expect("entry should fire");
        assert_eq!(event.kind, SignalKind::Buy);
        assert_eq!(event.reason, SignalReason::TrendEntry);
        assert_eq!(event.price, 100.6);
        assert_eq!(event.timestamp, now());
    }

    #[test]
    fn test_entry_filters() {
        let config = SignalConfig::default();
        let flat = PositionState::Flat;
        let cooldown = CooldownClock::new();

        // Price confirmation not met: 100.5 is not strictly above 100.5
        assert!(evaluate(&config, &input(&flat, &cooldown, bullish_snapshot(), 100.5, 100.0)).is_none());

        // Bearish EMAs
        let bearish = IndicatorSnapshot {
            ema_short: 99.0,
            ..bullish_snapshot()
        };
        assert!(evaluate(&config, &input(&flat, &cooldown, bearish, 101.0, 100.0)).is_none());

        // RSI outside entry band
        let hot = IndicatorSnapshot {
            rsi: 75.1,
            ..bullish_snapshot()
        };
        assert!(evaluate(&config, &input(&flat, &cooldown, hot, 101.0, 100.0)).is_none());

        // EMA separation below atr * 0.05
        let tight = IndicatorSnapshot {
            ema_short: 100.04,
            ..bullish_snapshot()
        };
        assert!(evaluate(&config, &input(&flat, &cooldown, tight, 101.0, 100.0)).is_none());
    }

    #[test]
    fn test_rsi_band_is_inclusive() {
        let config = SignalConfig::default();
        let flat = PositionState::Flat;
        let cooldown = CooldownClock::new();

        for rsi in [40.0, 75.0] {
            let snapshot = IndicatorSnapshot {
                rsi,
                ..bullish_snapshot()
            };
            assert!(evaluate(&config, &input(&flat, &cooldown, snapshot, 101.0, 100.0)).is_some());
        }
    }

    #[test]
    fn test_cooldown_gates_entry() {
        let config = SignalConfig::default();
        let flat = PositionState::Flat;
        let mut cooldown = CooldownClock::new();

        cooldown.reset(now() - Duration::milliseconds(9_999));
        assert!(evaluate(&config, &input(&flat, &cooldown, bullish_snapshot(), 101.0, 100.0)).is_none());

        cooldown.reset(now() - Duration::milliseconds(10_000));
        assert!(evaluate(&config, &input(&flat, &cooldown, bullish_snapshot(), 101.0, 100.0)).is_some());
    }

    #[test]
    fn test_cooldown_does_not_gate_exit() {
        let config = SignalConfig::default();
        let long = long_at(100.0, 0.0);
        let mut cooldown = CooldownClock::new();
        cooldown.reset(now());

        let event = evaluate(&config, &input(&long, &cooldown, bullish_snapshot(), 99.0, 99.5))
            .expect("stop-loss must fire during cooldown");
        assert_eq!(event.kind, SignalKind::Sell);
        assert_eq!(event.reason, SignalReason::StopLoss);
    }

    #[test]
    fn test_stop_loss_threshold() {
        let config = SignalConfig::default();
        let long = long_at(100.0, 0.0);
        let cooldown = CooldownClock::new();

        // -0.6 %: holds
        assert!(evaluate(&config, &input(&long, &cooldown, bullish_snapshot(), 99.4, 99.4)).is_none());

        // -0.7 % fires
        let event = evaluate(&config, &input(&long, &cooldown, bullish_snapshot(), 99.29, 99.29)).unwrap();
        assert_eq!(event.reason, SignalReason::StopLoss);
    }

    #[test]
    fn test_stop_loss_wins_over_ema_reversal() {
        let config = SignalConfig::default();
        let long = long_at(100.0, 0.0);
        let cooldown = CooldownClock::new();
        let bearish = IndicatorSnapshot {
            ema_short: 99.0,
            ..bullish_snapshot()
        };

        let event = evaluate(&config, &input(&long, &cooldown, bearish, 98.0, 98.0)).unwrap();
        assert_eq!(event.reason, SignalReason::StopLoss);
    }

    #[test]
    fn test_ema_reversal_regardless_of_profit() {
        let config = SignalConfig::default();
        let long = long_at(100.0, 0.0);
        let cooldown = CooldownClock::new();
        let bearish = IndicatorSnapshot {
            ema_short: 99.0,
            ..bullish_snapshot()
        };

        let winning = evaluate(&config, &input(&long, &cooldown, bearish, 102.0, 101.0)).unwrap();
        assert_eq!(winning.reason, SignalReason::EmaReversal);

        let losing = evaluate(&config, &input(&long, &cooldown, bearish, 99.8, 99.9)).unwrap();
        assert_eq!(losing.reason, SignalReason::EmaReversal);
    }

    #[test]
    fn test_rsi_reversal_requires_profit_and_falling_price() {
        let config = SignalConfig::default();
        let long = long_at(100.0, 0.0);
        let cooldown = CooldownClock::new();
        let overbought = IndicatorSnapshot {
            rsi: 85.0,
            atr: 10.0, // keep momentum rule out of the way
            ..bullish_snapshot()
        };

        let event = evaluate(&config, &input(&long, &cooldown, overbought, 103.0, 104.0)).unwrap();
        assert_eq!(event.reason, SignalReason::RsiReversal);

        // Rising price: no exit
        assert!(evaluate(&config, &input(&long, &cooldown, overbought, 104.0, 103.0)).is_none());

        // Falling but not profitable: no exit
        assert!(evaluate(&config, &input(&long, &cooldown, overbought, 99.9, 100.5)).is_none());
    }

    #[test]
    fn test_oversold_rsi_does_not_close_long() {
        let config = SignalConfig::default();
        let long = long_at(100.0, 0.0);
        let cooldown = CooldownClock::new();
        let oversold = IndicatorSnapshot {
            rsi: 20.0,
            atr: 10.0,
            ..bullish_snapshot()
        };

        // Profitable and falling, RSI below the lower exit bound: hold
        assert!(config.rsi_exit_lower > 20.0);
        assert!(evaluate(&config, &input(&long, &cooldown, oversold, 103.0, 104.0)).is_none());
    }

    #[test]
    fn test_momentum_loss_requires_profit() {
        let config = SignalConfig::default();
        let long = long_at(100.0, 0.0);
        let cooldown = CooldownClock::new();

        // 102.0 < 103.0 - 0.5
        let event = evaluate(&config, &input(&long, &cooldown, bullish_snapshot(), 102.0, 103.0)).unwrap();
        assert_eq!(event.reason, SignalReason::MomentumLoss);

        // Same drop below entry price: not profitable, hold
        assert!(evaluate(&config, &input(&long, &cooldown, bullish_snapshot(), 99.6, 100.6)).is_none());
    }

    #[test]
    fn test_commission_affects_profitability() {
        let config = SignalConfig::default();
        let cooldown = CooldownClock::new();

        // Gross +0.15 %, momentum drop of 0.85 > 0.5 * ATR
        let free = long_at(100.0, 0.0);
        let event = evaluate(&config, &input(&free, &cooldown, bullish_snapshot(), 100.15, 101.0));
        assert_eq!(event.unwrap().reason, SignalReason::MomentumLoss);

        // Both commissions turn the same move into a net loss: hold
        let charged = long_at(100.0, 0.001);
        let mut charged_input = input(&charged, &cooldown, bullish_snapshot(), 100.15, 101.0);
        charged_input.commission_rate = 0.001;
        assert!(evaluate(&config, &charged_input).is_none());
    }

    #[test]
    fn test_profit_target() {
        let config = SignalConfig {
            min_profit_target_pct: Some(1.0),
            ..SignalConfig::default()
        };
        let long = long_at(100.0, 0.0);
        let cooldown = CooldownClock::new();

        assert!(evaluate(&config, &input(&long, &cooldown, bullish_snapshot(), 100.9, 100.8)).is_none());

        let event = evaluate(&config, &input(&long, &cooldown, bullish_snapshot(), 101.1, 101.0)).unwrap();
        assert_eq!(event.reason, SignalReason::ProfitTarget);

        // No target configured: holding a winner is fine
        let no_target = SignalConfig::default();
        assert!(evaluate(&no_target, &input(&long, &cooldown, bullish_snapshot(), 105.0, 104.9)).is_none());
    }

    #[test]
    fn test_flat_never_sells_and_long_never_buys() {
        let config = SignalConfig::default();
        let cooldown = CooldownClock::new();

        let flat = PositionState::Flat;
        let bearish = IndicatorSnapshot {
            ema_short: 99.0,
            ..bullish_snapshot()
        };
        assert!(evaluate(&config, &input(&flat, &cooldown, bearish, 90.0, 100.0)).is_none());

        let long = long_at(100.0, 0.0);
        let event = evaluate(&config, &input(&long, &cooldown, bullish_snapshot(), 100.6, 100.0));
        assert!(event.is_none());
    }
}
