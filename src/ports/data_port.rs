//! Historical data source port trait.

use crate::domain::bar::Bar;
use crate::domain::error::WalkForwardError;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `symbol` with `start <= date < end`, ordered by date.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, WalkForwardError>;
}
