//! CSV file data adapter.
//!
//! Reads `<base_path>/<SYMBOL>.csv`. The header must name a `date` column
//! (YYYY-MM-DD) and a `price` or `close` column; `volume` is optional.
//! Extra columns (open/high/low) are ignored.

use crate::domain::bar::{Bar, ensure_ordered};
use crate::domain::error::WalkForwardError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    price: usize,
    volume: Option<usize>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    fn locate_columns(headers: &csv::StringRecord) -> Result<Columns, WalkForwardError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let date = find("date").ok_or_else(|| WalkForwardError::Data {
            reason: "missing date column".into(),
        })?;
        let price = find("price")
            .or_else(|| find("close"))
            .ok_or_else(|| WalkForwardError::Data {
                reason: "missing price or close column".into(),
            })?;
        Ok(Columns {
            date,
            price,
            volume: find("volume"),
        })
    }
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<T, WalkForwardError>
where
    T::Err: std::fmt::Display,
{
    let raw = record.get(index).ok_or_else(|| WalkForwardError::Data {
        reason: format!("line {line}: missing {name} value"),
    })?;
    raw.trim().parse().map_err(|e| WalkForwardError::Data {
        reason: format!("line {line}: invalid {name} value {raw:?}: {e}"),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, WalkForwardError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| WalkForwardError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| WalkForwardError::Data {
                reason: format!("CSV header error: {}", e),
            })?
            .clone();
        let columns = Self::locate_columns(&headers)?;

        let mut bars = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let line = i + 2;
            let record = result.map_err(|e| WalkForwardError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(columns.date).unwrap_or_default().trim();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                WalkForwardError::Data {
                    reason: format!("line {line}: invalid date {date_str:?}: {e}"),
                }
            })?;

            if date < start || date >= end {
                continue;
            }

            let price: f64 = parse_field(&record, columns.price, "price", line)?;
            let volume: f64 = match columns.volume {
                Some(idx) => parse_field(&record, idx, "volume", line)?,
                None => 0.0,
            };

            if !price.is_finite() || price <= 0.0 {
                return Err(WalkForwardError::Data {
                    reason: format!("line {line}: price must be positive and finite, got {price}"),
                });
            }
            if !volume.is_finite() {
                return Err(WalkForwardError::Data {
                    reason: format!("line {line}: volume must be finite, got {volume}"),
                });
            }

            bars.push(Bar::new(date, price, volume));
        }

        bars.sort_by_key(|b| b.date);
        ensure_ordered(&bars)?;
        tracing::debug!(symbol, bars = bars.len(), path = %path.display(), "loaded bars");
        Ok(bars)
    }
}
