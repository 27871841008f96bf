use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::SignalReason;

/// A long position opened with the full available capital
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub id: Uuid,
    pub entry_price: f64,
    pub cost_basis_per_unit: f64, // Entry price including entry commission
    pub position_value: f64,      // Capital committed at entry
    pub entry_time: DateTime<Utc>,
}

impl OpenPosition {
    /// Units held
    pub fn quantity(&self) -> f64 {
        self.position_value / self.entry_price
    }

    /// Profit per unit after paying exit commission
    pub fn profit_per_unit(&self, exit_price: f64, commission_rate: f64) -> f64 {
        exit_price * (1.0 - commission_rate) - self.cost_basis_per_unit
    }

    /// Realized profit if the position were closed at `exit_price`
    pub fn total_profit(&self, exit_price: f64, commission_rate: f64) -> f64 {
        self.quantity() * self.profit_per_unit(exit_price, commission_rate)
    }

    /// Commission-adjusted profit/loss as a percentage of the position value
    pub fn net_pnl_pct(&self, exit_price: f64, commission_rate: f64) -> f64 {
        self.total_profit(exit_price, commission_rate) / self.position_value * 100.0
    }
}

/// Either flat or holding exactly one long position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long(OpenPosition),
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    pub fn open_position(&self) -> Option<&OpenPosition> {
        match self {
            PositionState::Flat => None,
            PositionState::Long(position) => Some(position),
        }
    }
}

/// Realized capital balance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub initial_capital: f64,
    pub current_capital: f64,
}

impl Ledger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            current_capital: initial_capital,
        }
    }

    pub fn realized_pnl(&self) -> f64 {
        self.current_capital - self.initial_capital
    }

    pub fn realized_pnl_pct(&self) -> f64 {
        self.realized_pnl() / self.initial_capital * 100.0
    }
}

/// Record of a completed round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub id: Uuid,
    pub entry_price: f64,
    pub exit_price: f64,
    pub position_value: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub total_profit: f64,
    pub net_pnl_pct: f64,
    pub reason: SignalReason,
}

/// Tracks the position state machine and the capital ledger
///
/// FLAT -> LONG on entry, LONG -> FLAT on exit; no other transitions.
#[derive(Debug, Clone)]
pub struct PositionManager {
    state: PositionState,
    ledger: Ledger,
    commission_rate: f64,
    closed_trades: Vec<ClosedTrade>,
}

impl PositionManager {
    pub fn new(initial_capital: f64, commission_rate: f64) -> Self {
        Self {
            state: PositionState::Flat,
            ledger: Ledger::new(initial_capital),
            commission_rate,
            closed_trades: Vec::new(),
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn ledger(&self) -> Ledger {
        self.ledger
    }

    pub fn commission_rate(&self) -> f64 {
        self.commission_rate
    }

    pub fn is_flat(&self) -> bool {
        self.state.is_flat()
    }

    /// All completed round trips, oldest first
    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    /// Open a long position using the full current capital
    ///
    /// The entry commission is deducted from capital immediately.
    pub fn open_position(
        &mut self,
        entry_price: f64,
        entry_time: DateTime<Utc>,
    ) -> anyhow::Result<Uuid> {
        if !self.state.is_flat() {
            anyhow::bail!("Already have an open position");
        }
        if !(entry_price.is_finite() && entry_price > 0.0) {
            anyhow::bail!("Invalid entry price: {}", entry_price);
        }

        let id = Uuid::new_v4();
        let position_value = self.ledger.current_capital;
        let entry_commission = position_value * self.commission_rate;

        self.ledger.current_capital -= entry_commission;
        self.state = PositionState::Long(OpenPosition {
            id,
            entry_price,
            cost_basis_per_unit: entry_price * (1.0 + self.commission_rate),
            position_value,
            entry_time,
        });

        tracing::info!(
            position_id = %id,
            entry_price,
            position_value,
            entry_commission,
            "Opened long position"
        );

        Ok(id)
    }

    /// Close the open position and realize its profit into the ledger
    pub fn close_position(
        &mut self,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: SignalReason,
    ) -> anyhow::Result<ClosedTrade> {
        let position = match std::mem::take(&mut self.state) {
            PositionState::Long(position) => position,
            PositionState::Flat => anyhow::bail!("No open position to close"),
        };

        let total_profit = position.total_profit(exit_price, self.commission_rate);
        let net_pnl_pct = position.net_pnl_pct(exit_price, self.commission_rate);
        self.ledger.current_capital += total_profit;

        let trade = ClosedTrade {
            id: position.id,
            entry_price: position.entry_price,
            exit_price,
            position_value: position.position_value,
            entry_time: position.entry_time,
            exit_time,
            total_profit,
            net_pnl_pct,
            reason,
        };

        tracing::info!(
            position_id = %trade.id,
            exit_price,
            total_profit,
            net_pnl_pct,
            capital = self.ledger.current_capital,
            %reason,
            "Closed long position"
        );

        self.closed_trades.push(trade.clone());
        Ok(trade)
    }

    /// Capital plus the unrealized result of the open position, if any
    pub fn mark_to_market(&self, current_price: f64) -> f64 {
        match &self.state {
            PositionState::Flat => self.ledger.current_capital,
            PositionState::Long(position) => {
                self.ledger.current_capital
                    + position.total_profit(current_price, self.commission_rate)
            }
        }
    }
}
