//! Domain error types.

use chrono::NaiveDate;
use std::time::Duration;

/// Top-level error type for walkforward.
#[derive(Debug, thiserror::Error)]
pub enum WalkForwardError {
    #[error(
        "invalid split of {total} bars at ratio {ratio}: training {training} bars, testing {testing} bars"
    )]
    InvalidSplit {
        total: usize,
        training: usize,
        testing: usize,
        ratio: f64,
    },

    #[error("invalid config value [{section}] {key}: {reason}")]
    InvalidConfig {
        section: String,
        key: String,
        reason: String,
    },

    #[error("strategy failed at {timestamp} with parameters {parameters}: {reason}")]
    Strategy {
        timestamp: NaiveDate,
        parameters: String,
        reason: String,
    },

    #[error(
        "insufficient data: training has {training} bars, testing has {testing} bars, need {minimum}"
    )]
    InsufficientData {
        training: usize,
        testing: usize,
        minimum: usize,
    },

    #[error("run exceeded wall-clock limit of {limit:?} after {elapsed:?}")]
    RunTimeout { elapsed: Duration, limit: Duration },

    #[error("bars out of order at index {index}: {previous} is not before {current}")]
    UnorderedBars {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WalkForwardError {
    pub(crate) fn invalid_config(section: &str, key: &str, reason: impl Into<String>) -> Self {
        WalkForwardError::InvalidConfig {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures confined to a single run, which a sweep records
    /// instead of propagating.
    pub fn is_run_failure(&self) -> bool {
        matches!(
            self,
            WalkForwardError::Strategy { .. } | WalkForwardError::RunTimeout { .. }
        )
    }
}

impl From<&WalkForwardError> for std::process::ExitCode {
    fn from(err: &WalkForwardError) -> Self {
        let code: u8 = match err {
            WalkForwardError::Io(_) | WalkForwardError::Data { .. } => 1,
            WalkForwardError::ConfigParse { .. }
            | WalkForwardError::ConfigMissing { .. }
            | WalkForwardError::InvalidConfig { .. } => 2,
            WalkForwardError::InvalidSplit { .. }
            | WalkForwardError::InsufficientData { .. }
            | WalkForwardError::UnorderedBars { .. } => 3,
            WalkForwardError::Strategy { .. } | WalkForwardError::RunTimeout { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
