//! Training / testing window partition.

use chrono::NaiveDate;

use super::bar::Bar;
use super::error::WalkForwardError;

/// Absorbs representation error in `N*ratio`, e.g. `100.0 * 0.29 = 28.999...`.
const CUT_EPSILON: f64 = 1e-9;

/// Partitions `bars` into `[0, floor(N*ratio))` and `[floor(N*ratio), N)`.
///
/// Both slices borrow the input. Fails when the ratio is not strictly
/// inside (0, 1) or when either slice would be empty.
pub fn split(bars: &[Bar], ratio: f64) -> Result<(&[Bar], &[Bar]), WalkForwardError> {
    let total = bars.len();
    let cut = if ratio.is_finite() && ratio > 0.0 && ratio < 1.0 {
        (total as f64 * ratio + CUT_EPSILON).floor() as usize
    } else {
        0
    };
    let invalid = || WalkForwardError::InvalidSplit {
        total,
        training: cut,
        testing: total.saturating_sub(cut),
        ratio,
    };

    if !(ratio.is_finite() && ratio > 0.0 && ratio < 1.0) {
        return Err(invalid());
    }
    if total < 2 || cut == 0 || cut >= total {
        return Err(invalid());
    }

    Ok(bars.split_at(cut))
}

/// Bar count and date bounds of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSummary {
    pub bars: usize,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl WindowSummary {
    pub fn of(bars: &[Bar]) -> Self {
        WindowSummary {
            bars: bars.len(),
            start: bars.first().map(|b| b.date),
            end: bars.last().map(|b| b.date),
        }
    }
}
