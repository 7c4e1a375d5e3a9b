//! Price bar representation.

use chrono::NaiveDate;

use super::error::WalkForwardError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub price: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, price: f64, volume: f64) -> Self {
        Bar {
            date,
            price,
            volume,
        }
    }
}

/// Fails unless every bar is strictly later than the one before it.
pub fn ensure_ordered(bars: &[Bar]) -> Result<(), WalkForwardError> {
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].date <= pair[0].date {
            return Err(WalkForwardError::UnorderedBars {
                index: i + 1,
                previous: pair[0].date,
                current: pair[1].date,
            });
        }
    }
    Ok(())
}
