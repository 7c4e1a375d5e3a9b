//! Trade log entries emitted by the runner.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub date: NaiveDate,
    pub side: Side,
    /// Always positive; direction lives in `side`.
    pub quantity: f64,
    pub price: f64,
    pub cost: f64,
}

impl Trade {
    /// Builds the trade that moves `current` to `target` at `price`.
    /// Returns `None` when no position change is needed.
    pub fn for_change(date: NaiveDate, current: f64, target: f64, price: f64) -> Option<Self> {
        let delta = target - current;
        if delta == 0.0 {
            return None;
        }
        let side = if delta > 0.0 { Side::Buy } else { Side::Sell };
        Some(Trade {
            date,
            side,
            quantity: delta.abs(),
            price,
            cost: 0.0,
        })
    }

    /// Signed quantity: positive for buys, negative for sells.
    pub fn signed_quantity(&self) -> f64 {
        match self.side {
            Side::Buy => self.quantity,
            Side::Sell => -self.quantity,
        }
    }

    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }
}
