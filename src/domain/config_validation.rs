//! Configuration validation and typed settings.
//!
//! Every value is checked before a run starts. The `build_*` functions are
//! strict: a value that is present but malformed is an error, never a
//! silent fallback to the default.

use crate::domain::cost::CostModel;
use crate::domain::error::WalkForwardError;
use crate::domain::metrics::{MetricsConfig, TRADING_DAYS_PER_YEAR};
use crate::domain::params::ParameterSet;
use crate::domain::runner::RunConfig;
use crate::domain::strategy::{BUILTIN_NAMES, builtin};
use crate::domain::sweep::{Perturbation, SweepConfig};
use crate::domain::validation::{DEFAULT_MIN_WINDOW_BARS, DEFAULT_SPLIT_RATIO, ValidationConfig};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

/// Where to load bars from. The date range is half-open: `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequest {
    pub dir: PathBuf,
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), WalkForwardError> {
    build_data_request(config)?;
    build_validation_config(config)?;
    strategy_name(config)?;
    build_parameters(config)?;
    build_perturbations(config)?;
    Ok(())
}

pub fn build_data_request(config: &dyn ConfigPort) -> Result<DataRequest, WalkForwardError> {
    let dir = require_string(config, "data", "dir")?;
    let symbol = require_string(config, "data", "symbol")?;
    let start = read_date(config, "data", "start_date")?.unwrap_or(NaiveDate::MIN);
    let end = read_date(config, "data", "end_date")?.unwrap_or(NaiveDate::MAX);

    if start >= end {
        return Err(WalkForwardError::invalid_config(
            "data",
            "start_date",
            "start_date must be before end_date",
        ));
    }

    Ok(DataRequest {
        dir: PathBuf::from(dir),
        symbol: symbol.to_uppercase(),
        start,
        end,
    })
}

pub fn build_cost_model(config: &dyn ConfigPort) -> Result<CostModel, WalkForwardError> {
    CostModel::new(
        read_double(config, "costs", "per_share_fee", 0.0)?,
        read_double(config, "costs", "minimum_fee", 0.0)?,
        read_double(config, "costs", "slippage_fraction", 0.0)?,
    )
}

pub fn build_validation_config(config: &dyn ConfigPort) -> Result<ValidationConfig, WalkForwardError> {
    let split_ratio = read_double(config, "validation", "split_ratio", DEFAULT_SPLIT_RATIO)?;
    if !(split_ratio > 0.0 && split_ratio < 1.0) {
        return Err(WalkForwardError::invalid_config(
            "validation",
            "split_ratio",
            "split_ratio must be strictly between 0 and 1",
        ));
    }

    let min_window_bars = read_usize(
        config,
        "validation",
        "min_window_bars",
        DEFAULT_MIN_WINDOW_BARS,
    )?;
    if min_window_bars < 2 {
        return Err(WalkForwardError::invalid_config(
            "validation",
            "min_window_bars",
            "min_window_bars must be at least 2",
        ));
    }

    let initial_capital = read_double(config, "validation", "initial_capital", 100_000.0)?;
    let periods_per_year =
        read_double(config, "validation", "periods_per_year", TRADING_DAYS_PER_YEAR)?;
    if periods_per_year <= 0.0 {
        return Err(WalkForwardError::invalid_config(
            "validation",
            "periods_per_year",
            "periods_per_year must be positive",
        ));
    }

    let risk_free_rate = read_double(config, "validation", "risk_free_rate", 0.0)?;
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(WalkForwardError::invalid_config(
            "validation",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }

    let max_duration = match read_optional_double(config, "validation", "max_run_seconds")? {
        Some(secs) if secs > 0.0 => Some(Duration::try_from_secs_f64(secs).map_err(|e| {
            WalkForwardError::invalid_config("validation", "max_run_seconds", e.to_string())
        })?),
        Some(_) => {
            return Err(WalkForwardError::invalid_config(
                "validation",
                "max_run_seconds",
                "max_run_seconds must be positive",
            ));
        }
        None => None,
    };

    let run = RunConfig {
        initial_capital,
        costs: build_cost_model(config)?,
        max_duration,
    };
    run.validate()?;

    Ok(ValidationConfig {
        split_ratio,
        min_window_bars,
        sweep: SweepConfig {
            run,
            metrics: MetricsConfig {
                periods_per_year,
                risk_free_rate,
            },
            parallel: read_bool(config, "validation", "parallel", false)?,
            threads: read_usize(config, "validation", "threads", 0)?,
        },
    })
}

/// Configured built-in strategy name, lowercased.
pub fn strategy_name(config: &dyn ConfigPort) -> Result<String, WalkForwardError> {
    let name = require_string(config, "strategy", "name")?.to_lowercase();
    if builtin(&name).is_none() {
        return Err(WalkForwardError::invalid_config(
            "strategy",
            "name",
            format!(
                "unknown strategy {name:?}, expected one of: {}",
                BUILTIN_NAMES.join(", ")
            ),
        ));
    }
    Ok(name)
}

pub fn build_parameters(config: &dyn ConfigPort) -> Result<ParameterSet, WalkForwardError> {
    let mut params = ParameterSet::new();
    for key in config.keys("parameters") {
        let value = read_optional_double(config, "parameters", &key)?.ok_or_else(|| {
            WalkForwardError::invalid_config("parameters", &key, "parameter needs a value")
        })?;
        params = params.with(&key, value);
    }
    Ok(params)
}

/// Perturbations in file order: `name = v1, v2, ...`.
pub fn build_perturbations(config: &dyn ConfigPort) -> Result<Vec<Perturbation>, WalkForwardError> {
    config
        .keys("sweep")
        .into_iter()
        .map(|key| {
            let raw = config.get_string("sweep", &key).unwrap_or_default();
            let candidates = parse_list(&raw).map_err(|reason| {
                WalkForwardError::invalid_config("sweep", &key, reason)
            })?;
            Ok(Perturbation::new(&key, candidates))
        })
        .collect()
}

fn parse_list(raw: &str) -> Result<Vec<f64>, String> {
    let values = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("invalid candidate value {s:?}"))
        })
        .collect::<Result<Vec<f64>, String>>()?;
    if values.is_empty() {
        return Err("candidate list must not be empty".to_string());
    }
    Ok(values)
}

fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, WalkForwardError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(WalkForwardError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn read_optional_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, WalkForwardError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(WalkForwardError::invalid_config(
                section,
                key,
                format!("expected a number, got {s:?}"),
            )),
        },
    }
}

fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, WalkForwardError> {
    Ok(read_optional_double(config, section, key)?.unwrap_or(default))
}

fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, WalkForwardError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) => s.trim().parse::<usize>().map_err(|_| {
            WalkForwardError::invalid_config(
                section,
                key,
                format!("expected a non-negative integer, got {s:?}"),
            )
        }),
    }
}

fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, WalkForwardError> {
    if config.get_string(section, key).is_none() {
        return Ok(default);
    }
    // Probe with both defaults: an unparseable value falls back to each.
    let as_true = config.get_bool(section, key, true);
    let as_false = config.get_bool(section, key, false);
    if as_true != as_false {
        return Err(WalkForwardError::invalid_config(
            section,
            key,
            "expected true/false, yes/no or 1/0",
        ));
    }
    Ok(as_true)
}

fn read_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, WalkForwardError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                WalkForwardError::invalid_config(
                    section,
                    key,
                    format!("invalid {key} format, expected YYYY-MM-DD"),
                )
            }),
    }
}
