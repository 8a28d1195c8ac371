//! Trade simulation: turns a signal sequence into realized trades.
//!
//! The engine holds at most one position. A `buy` closes any short and opens
//! a long, a `sell` closes any long and opens a short. Once either loss
//! breaker has tripped the new side is not opened and the closed position
//! stays held at its original entry, so a later opposite signal closes it
//! again. No action is taken within `min_trade_interval_days` of the last
//! close. A position still open at the end of the series is left unrealized.

use chrono::NaiveDate;

use super::market::MarketSeries;
use super::position::{Position, Side, Trade};
use super::signal::Signal;

pub const INITIAL_PORTFOLIO_VALUE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Fraction of portfolio value committed per position.
    pub position_size: f64,
    pub min_trade_interval_days: i64,
    pub max_consecutive_losses: u32,
    pub max_total_losses: u32,
    /// Wins in a row after which the next position is scaled up.
    pub win_streak_threshold: u32,
    pub win_streak_multiplier: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            position_size: 0.10,
            min_trade_interval_days: 5,
            max_consecutive_losses: 3,
            max_total_losses: 8,
            win_streak_threshold: 5,
            win_streak_multiplier: 1.5,
        }
    }
}

/// Mutable state of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationState {
    pub position: Position,
    pub portfolio_value: f64,
    pub consecutive_losses: u32,
    pub total_losses: u32,
    pub win_streak: u32,
    pub last_trade_time: Option<NaiveDate>,
    pub trades: Vec<Trade>,
}

impl SimulationState {
    pub fn new() -> Self {
        SimulationState {
            position: Position::Flat,
            portfolio_value: INITIAL_PORTFOLIO_VALUE,
            consecutive_losses: 0,
            total_losses: 0,
            win_streak: 0,
            last_trade_time: None,
            trades: Vec::new(),
        }
    }

    pub fn breakers_tripped(&self, config: &SimulationConfig) -> bool {
        self.consecutive_losses >= config.max_consecutive_losses
            || self.total_losses >= config.max_total_losses
    }

    fn in_cooldown(&self, now: NaiveDate, config: &SimulationConfig) -> bool {
        self.last_trade_time
            .is_some_and(|last| (now - last).num_days() < config.min_trade_interval_days)
    }

    fn position_size(&self, config: &SimulationConfig) -> f64 {
        if self.win_streak >= config.win_streak_threshold {
            config.position_size * config.win_streak_multiplier
        } else {
            config.position_size
        }
    }

    fn close(&mut self, price: f64, now: NaiveDate, size: f64) {
        let Position::Open {
            entry_price,
            entry_time,
            ..
        } = self.position
        else {
            return;
        };

        let profit = self.position.price_change(price) * size * self.portfolio_value;
        self.portfolio_value += profit;

        if profit < 0.0 {
            self.consecutive_losses += 1;
            self.total_losses += 1;
            self.win_streak = 0;
        } else {
            self.consecutive_losses = 0;
            self.win_streak += 1;
        }

        self.trades.push(Trade {
            entry_price,
            exit_price: price,
            entry_time,
            exit_time: now,
            profit: profit / self.portfolio_value * 100.0,
        });
        self.last_trade_time = Some(now);
    }

    /// Apply one signal at one index. A refused reopen leaves `position`
    /// unchanged.
    pub fn step(&mut self, signal: Signal, price: f64, now: NaiveDate, config: &SimulationConfig) {
        if self.in_cooldown(now, config) {
            return;
        }

        let side = match signal {
            Signal::Buy if !self.position.is_long() => Side::Long,
            Signal::Sell if !self.position.is_short() => Side::Short,
            _ => return,
        };

        let size = self.position_size(config);
        self.close(price, now, size);

        if !self.breakers_tripped(config) {
            self.position = Position::Open {
                side,
                entry_price: price,
                entry_time: now,
            };
        }
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulate `signals` over `series` and return every closed trade in order.
///
/// Signals beyond the series length are ignored.
pub fn simulate(
    signals: &[Signal],
    series: &MarketSeries,
    config: &SimulationConfig,
) -> Vec<Trade> {
    let mut state = SimulationState::new();
    for (signal, point) in signals.iter().zip(series.points()) {
        state.step(*signal, point.price, point.timestamp, config);
    }
    state.trades
}
