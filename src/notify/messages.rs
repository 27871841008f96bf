//! Human-readable notification texts

use crate::execution::engine::{EngineStatus, ExecutedSignal};
use crate::execution::position_manager::PositionState;
use crate::models::SignalKind;
use crate::strategy::SignalConfig;

pub fn signal_message(symbol: &str, config: &SignalConfig, signal: &ExecutedSignal) -> String {
    let event = &signal.event;
    let snap = &event.snapshot;

    let header = match event.kind {
        SignalKind::Buy => format!("📈 BUY SIGNAL {}", symbol),
        SignalKind::Sell => format!("📉 SELL SIGNAL {} (closing long)", symbol),
    };

    let mut text = format!(
        "{}\nReason: {}\nPrice: {:.2}\nEMA{}: {:.2} | EMA{}: {:.2}\nRSI({}): {:.1}\nATR({}): {:.2}",
        header,
        event.reason,
        event.price,
        config.ema_short_period,
        snap.ema_short,
        config.ema_long_period,
        snap.ema_long,
        config.rsi_period,
        snap.rsi,
        config.atr_period,
        snap.atr,
    );

    if let Some(trade) = &signal.trade {
        text.push_str(&format!(
            "\nProfit: {:+.2} ({:+.2}%)\nCapital: {:.2}",
            trade.total_profit, trade.net_pnl_pct, signal.capital
        ));
    }

    text
}

/// Periodic "still alive" message, also sent on every feed (re)connect
pub fn status_message(status: &EngineStatus) -> String {
    let price = match status.last_close {
        Some(close) => format!("Price: {:.2}", close),
        None => "(waiting for price)".to_string(),
    };

    let position = match &status.position {
        PositionState::Flat => "FLAT".to_string(),
        PositionState::Long(p) => format!("LONG @ {:.2}", p.entry_price),
    };

    format!(
        "🤖 Bot running! {} {}\nPosition: {}\nCapital: {:.2} (realized {:+.2}%) | Equity: {:.2}",
        status.symbol,
        price,
        position,
        status.ledger.current_capital,
        status.ledger.realized_pnl_pct(),
        status.equity
    )
}

pub fn hold_message(status: &EngineStatus) -> String {
    format!(
        "🧘 HOLD {} (no position). Waiting for a new signal...",
        status.symbol
    )
}
