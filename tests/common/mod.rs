#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
use walkforward::domain::bar::Bar;
use walkforward::domain::error::WalkForwardError;
use walkforward::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, WalkForwardError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(WalkForwardError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date < end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(d: &str, price: f64) -> Bar {
    Bar::new(date(d), price, 1000.0)
}

/// Daily bars with an upward drift and a slow oscillation on top.
pub fn generate_bars(start: &str, count: usize, base_price: f64) -> Vec<Bar> {
    let start = date(start);
    (0..count)
        .map(|i| {
            let t = i as f64;
            let price = base_price + t * 0.2 + 4.0 * (t / 7.0).sin();
            Bar::new(start + chrono::Duration::days(i as i64), price, 1000.0)
        })
        .collect()
}

pub fn bars_to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("date,price,volume\n");
    for b in bars {
        out.push_str(&format!("{},{},{}\n", b.date, b.price, b.volume));
    }
    out
}

pub fn exit_code_string(code: std::process::ExitCode) -> String {
    format!("{code:?}")
}

pub fn expected_exit(code: u8) -> String {
    format!("{:?}", std::process::ExitCode::from(code))
}
