//! Walk-forward validation: split, in-sample run, out-of-sample run with
//! the same frozen parameters, then a sensitivity sweep on the
//! out-of-sample window.

use super::bar::{Bar, ensure_ordered};
use super::error::WalkForwardError;
use super::metrics::{Metrics, MetricsConfig};
use super::params::ParameterSet;
use super::runner::{self, RunConfig};
use super::split::{WindowSummary, split};
use super::sweep::{self, ParameterSensitivity, Perturbation, SweepConfig, SweepEntry};
use super::strategy::Strategy;

pub const DEFAULT_SPLIT_RATIO: f64 = 0.7;
pub const DEFAULT_MIN_WINDOW_BARS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    pub split_ratio: f64,
    /// Each window needs at least this many bars.
    pub min_window_bars: usize,
    pub sweep: SweepConfig,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            split_ratio: DEFAULT_SPLIT_RATIO,
            min_window_bars: DEFAULT_MIN_WINDOW_BARS,
            sweep: SweepConfig::default(),
        }
    }
}

impl ValidationConfig {
    pub fn run(&self) -> &RunConfig {
        &self.sweep.run
    }

    pub fn metrics(&self) -> &MetricsConfig {
        &self.sweep.metrics
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowResult {
    pub window: WindowSummary,
    pub metrics: Metrics,
    pub final_equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub parameters: ParameterSet,
    pub training: WindowResult,
    pub testing: WindowResult,
    pub sweep: Vec<SweepEntry>,
    pub sensitivity: Vec<ParameterSensitivity>,
}

impl ValidationReport {
    /// Out-of-sample minus in-sample total return. Negative values mean the
    /// strategy did worse on data it was not tuned on.
    pub fn degradation(&self) -> f64 {
        self.testing.metrics.total_return - self.training.metrics.total_return
    }

    pub fn failed_sweep_runs(&self) -> usize {
        self.sweep.iter().filter(|e| e.outcome.is_failed()).count()
    }
}

pub fn validate<S>(
    bars: &[Bar],
    params: &ParameterSet,
    perturbations: &[Perturbation],
    strategy: &S,
    config: &ValidationConfig,
) -> Result<ValidationReport, WalkForwardError>
where
    S: Strategy + Sync + ?Sized,
{
    ensure_ordered(bars)?;
    config.run().validate()?;

    let (training_bars, testing_bars) = split(bars, config.split_ratio)?;
    let minimum = config.min_window_bars;
    if training_bars.len() < minimum || testing_bars.len() < minimum {
        return Err(WalkForwardError::InsufficientData {
            training: training_bars.len(),
            testing: testing_bars.len(),
            minimum,
        });
    }

    tracing::info!(
        training = training_bars.len(),
        testing = testing_bars.len(),
        %params,
        "starting walk-forward validation"
    );

    let frozen = params.clone();
    let training = evaluate_window(training_bars, &frozen, strategy, config)?;
    let testing = evaluate_window(testing_bars, &frozen, strategy, config)?;

    let sweep = sweep::sweep(&frozen, perturbations, testing_bars, strategy, &config.sweep)?;
    let sensitivity = sweep::sensitivity(&sweep);

    let report = ValidationReport {
        parameters: frozen,
        training,
        testing,
        sweep,
        sensitivity,
    };

    tracing::info!(
        training_return = report.training.metrics.total_return,
        testing_return = report.testing.metrics.total_return,
        failed_sweep_runs = report.failed_sweep_runs(),
        "validation complete"
    );

    Ok(report)
}

fn evaluate_window<S: Strategy + ?Sized>(
    bars: &[Bar],
    params: &ParameterSet,
    strategy: &S,
    config: &ValidationConfig,
) -> Result<WindowResult, WalkForwardError> {
    let result = runner::run(bars, params, strategy, config.run())?;
    Ok(WindowResult {
        window: WindowSummary::of(bars),
        metrics: Metrics::compute(&result.returns, &result.trades, config.metrics()),
        final_equity: result.final_equity,
    })
}
