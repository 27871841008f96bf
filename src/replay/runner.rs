use chrono::{DateTime, Duration, Utc};

use crate::clock::{Clock, ManualClock};
use crate::execution::engine::{CandleOutcome, ExecutedSignal, TradingEngine};
use crate::execution::position_manager::{ClosedTrade, Ledger, PositionState};
use crate::models::Candle;

/// What happened over one replay
#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub candles_evaluated: usize,
    pub candles_skipped: usize,
    pub signals: Vec<ExecutedSignal>,
    pub trades: Vec<ClosedTrade>,
    pub final_ledger: Ledger,
    pub final_equity: f64,
    pub open_position: PositionState,
}

impl ReplayReport {
    pub fn winning_trades(&self) -> usize {
        self.trades.iter().filter(|t| t.total_profit > 0.0).count()
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades.is_empty() {
            return 0.0;
        }
        self.winning_trades() as f64 / self.trades.len() as f64 * 100.0
    }

    pub fn print_report(&self) {
        println!("\n=== REPLAY REPORT ===\n");

        println!("📊 LEDGER");
        println!("  Initial Capital:       {:.2}", self.final_ledger.initial_capital);
        println!("  Final Capital:         {:.2}", self.final_ledger.current_capital);
        println!(
            "  Realized P&L:          {:+.2} ({:+.2}%)",
            self.final_ledger.realized_pnl(),
            self.final_ledger.realized_pnl_pct()
        );
        println!("  Equity (marked):       {:.2}", self.final_equity);

        println!("\n📈 ACTIVITY");
        println!("  Candles Evaluated:     {}", self.candles_evaluated);
        println!("  Candles Skipped:       {}", self.candles_skipped);
        println!("  Signals:               {}", self.signals.len());
        println!(
            "  Closed Trades:         {} ({} winning, {:.1}%)",
            self.trades.len(),
            self.winning_trades(),
            self.win_rate()
        );

        if !self.trades.is_empty() {
            println!("\n💰 TRADES");
            for trade in &self.trades {
                println!(
                    "  {} -> {}  {:.2} -> {:.2}  {:+.2} ({:+.2}%)  [{}]",
                    trade.entry_time.format("%m-%d %H:%M"),
                    trade.exit_time.format("%m-%d %H:%M"),
                    trade.entry_price,
                    trade.exit_price,
                    trade.total_profit,
                    trade.net_pnl_pct,
                    trade.reason
                );
            }
        }

        if let PositionState::Long(position) = &self.open_position {
            println!("\n⏳ Still long from {:.2}", position.entry_price);
        }
    }
}

/// Drives a `TradingEngine` over a recorded candle series
///
/// Time comes from a manual clock that moves forward by a fixed step per
/// candle, so cooldowns behave as they would live.
pub struct ReplayRunner {
    engine: TradingEngine,
    clock: ManualClock,
}

impl ReplayRunner {
    pub fn new(engine: TradingEngine, start: DateTime<Utc>) -> Self {
        Self {
            engine,
            clock: ManualClock::new(start),
        }
    }

    pub fn engine(&self) -> &TradingEngine {
        &self.engine
    }

    pub fn into_engine(self) -> TradingEngine {
        self.engine
    }

    pub fn run(&mut self, candles: &[Candle], step: Duration) -> ReplayReport {
        tracing::info!(
            candles = candles.len(),
            step_secs = step.num_seconds(),
            "Starting replay"
        );

        let mut signals = Vec::new();
        let mut candles_evaluated = 0;
        let mut candles_skipped = 0;

        for candle in candles {
            self.clock.advance(step);
            match self.engine.on_candle(candle, self.clock.now()) {
                CandleOutcome::Ignored(_) => candles_skipped += 1,
                CandleOutcome::Collecting { .. } => {}
                CandleOutcome::Evaluated { signal, .. } => {
                    candles_evaluated += 1;
                    signals.extend(signal);
                }
            }
        }

        let status = self.engine.status();
        let report = ReplayReport {
            candles_evaluated,
            candles_skipped,
            signals,
            trades: self.engine.positions().closed_trades().to_vec(),
            final_ledger: status.ledger,
            final_equity: status.equity,
            open_position: status.position,
        };

        tracing::info!(
            signals = report.signals.len(),
            trades = report.trades.len(),
            capital = report.final_ledger.current_capital,
            "Replay complete"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignalKind;
    use crate::replay::synthetic::{MarketScenario, SyntheticDataGenerator};
    use crate::strategy::SignalConfig;

    fn start() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn runner() -> ReplayRunner {
        let engine = TradingEngine::new("SYNTH", SignalConfig::default(), 1000.0, 0.001, 2, start());
        ReplayRunner::new(engine, start())
    }

    #[test]
    fn test_replay_volatile_series() {
        let candles = SyntheticDataGenerator::new(42).generate(
            MarketScenario::Volatile,
            500,
            start(),
            Duration::minutes(1),
        );

        let mut runner = runner();
        let report = runner.run(&candles, Duration::minutes(1));

        assert_eq!(report.candles_evaluated, 500 - 20);
        assert_eq!(report.candles_skipped, 0);
        assert!(report.final_ledger.current_capital > 0.0);

        // Signals alternate BUY, SELL, BUY, ...
        for (i, signal) in report.signals.iter().enumerate() {
            let expected = if i % 2 == 0 { SignalKind::Buy } else { SignalKind::Sell };
            assert_eq!(signal.event.kind, expected);
        }
        assert_eq!(report.trades.len(), report.signals.len() / 2);
    }

    #[test]
    fn test_replay_ledger_matches_trades() {
        let candles = SyntheticDataGenerator::new(5).generate(
            MarketScenario::Crash,
            300,
            start(),
            Duration::minutes(1),
        );

        let mut runner = runner();
        let report = runner.run(&candles, Duration::minutes(1));

        // Capital = initial - entry commissions + realized profits
        let entries = report.signals.iter().filter(|s| s.event.kind == SignalKind::Buy).count();
        let mut expected = 1000.0;
        let mut trades = report.trades.iter();
        for _ in 0..entries {
            expected -= expected * 0.001;
            if let Some(trade) = trades.next() {
                expected += trade.total_profit;
            }
        }
        assert!((report.final_ledger.current_capital - expected).abs() < 1e-6);
    }

    #[test]
    fn test_replay_skips_duplicates() {
        let mut candles = SyntheticDataGenerator::new(1).generate(
            MarketScenario::Sideways,
            30,
            start(),
            Duration::minutes(1),
        );
        candles.insert(10, candles[9].clone());

        let mut runner = runner();
        let report = runner.run(&candles, Duration::minutes(1));

        assert_eq!(report.candles_skipped, 1);
        assert_eq!(runner.engine().buffer().len(), 23);
    }
}
