//! Open positions and realized trades.

use chrono::NaiveDate;

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Position {
    Flat,
    Open {
        side: Side,
        entry_price: f64,
        entry_time: NaiveDate,
    },
}

impl Position {
    pub fn is_long(&self) -> bool {
        matches!(self, Position::Open { side: Side::Long, .. })
    }

    pub fn is_short(&self) -> bool {
        matches!(self, Position::Open { side: Side::Short, .. })
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Position::Flat)
    }

    /// Fractional price move in the position's favour if closed at `price`.
    pub fn price_change(&self, price: f64) -> f64 {
        match *self {
            Position::Flat => 0.0,
            Position::Open {
                side: Side::Long,
                entry_price,
                ..
            } => (price - entry_price) / entry_price,
            Position::Open {
                side: Side::Short,
                entry_price,
                ..
            } => (entry_price - price) / entry_price,
        }
    }
}

/// A closed position. `profit` is percent of portfolio value at close.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDate,
    pub exit_time: NaiveDate,
    pub profit: f64,
}

impl Trade {
    pub fn is_loss(&self) -> bool {
        self.profit < 0.0
    }

    pub fn holding_days(&self) -> i64 {
        (self.exit_time - self.entry_time).num_days()
    }
}
