//! One-at-a-time parameter sensitivity sweep.
//!
//! Every candidate value of every perturbed parameter gets its own run on
//! a copy of the base parameters. Runs share the bars read-only and own
//! everything else, so they can execute on a rayon pool. Results always
//! come back in input order.

use rayon::prelude::*;
use std::cmp::Ordering;

use super::bar::Bar;
use super::error::WalkForwardError;
use super::metrics::{Metrics, MetricsConfig};
use super::params::ParameterSet;
use super::runner::{self, RunConfig};
use super::strategy::Strategy;

/// Candidate values for one named parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Perturbation {
    pub name: String,
    pub candidates: Vec<f64>,
}

impl Perturbation {
    pub fn new(name: &str, candidates: Vec<f64>) -> Self {
        Perturbation {
            name: name.to_string(),
            candidates,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepConfig {
    pub run: RunConfig,
    pub metrics: MetricsConfig,
    pub parallel: bool,
    /// Worker count when `parallel` is set; 0 uses rayon's global pool.
    pub threads: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    Completed(Metrics),
    Failed { reason: String },
}

impl SweepOutcome {
    pub fn metrics(&self) -> Option<&Metrics> {
        match self {
            SweepOutcome::Completed(m) => Some(m),
            SweepOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SweepOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepEntry {
    /// Name of the parameter that was perturbed.
    pub parameter: String,
    pub value: f64,
    pub params: ParameterSet,
    pub outcome: SweepOutcome,
}

pub fn sweep<S>(
    base: &ParameterSet,
    perturbations: &[Perturbation],
    bars: &[Bar],
    strategy: &S,
    config: &SweepConfig,
) -> Result<Vec<SweepEntry>, WalkForwardError>
where
    S: Strategy + Sync + ?Sized,
{
    config.run.validate()?;

    let jobs: Vec<(&str, f64, ParameterSet)> = perturbations
        .iter()
        .flat_map(|p| {
            p.candidates
                .iter()
                .map(move |&value| (p.name.as_str(), value, base.with_override(&p.name, value)))
        })
        .collect();

    tracing::info!(runs = jobs.len(), parallel = config.parallel, "starting sensitivity sweep");

    let evaluate = |job: &(&str, f64, ParameterSet)| -> Result<SweepEntry, WalkForwardError> {
        let (name, value, params) = job;
        let outcome = match runner::run(bars, params, strategy, &config.run) {
            Ok(result) => SweepOutcome::Completed(Metrics::compute(
                &result.returns,
                &result.trades,
                &config.metrics,
            )),
            Err(e) if e.is_run_failure() => {
                tracing::warn!(parameter = *name, value = *value, error = %e, "sweep run failed");
                SweepOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            Err(e) => return Err(e),
        };
        Ok(SweepEntry {
            parameter: name.to_string(),
            value: *value,
            params: params.clone(),
            outcome,
        })
    };

    let entries: Vec<SweepEntry> = if !config.parallel {
        jobs.iter().map(evaluate).collect::<Result<Vec<_>, _>>()?
    } else if config.threads > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| WalkForwardError::invalid_config("validation", "threads", e.to_string()))?;
        pool.install(|| jobs.par_iter().map(evaluate).collect::<Result<Vec<_>, _>>())?
    } else {
        jobs.par_iter().map(evaluate).collect::<Result<Vec<_>, _>>()?
    };

    Ok(entries)
}

/// Ordering criterion for sweep results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankKey {
    TotalReturn,
    SharpeRatio,
    /// Smaller drawdown ranks higher.
    MaxDrawdown,
}

impl RankKey {
    fn score(self, m: &Metrics) -> f64 {
        match self {
            RankKey::TotalReturn => m.total_return,
            RankKey::SharpeRatio => m.sharpe_ratio,
            RankKey::MaxDrawdown => -m.max_drawdown,
        }
    }
}

/// Best-first ordering. Ties keep input order. Completed runs with a
/// non-finite score sort after the finite ones, and failed runs sort last.
pub fn rank(entries: &[SweepEntry], key: RankKey) -> Vec<&SweepEntry> {
    let finite_score = |entry: &SweepEntry| {
        entry
            .outcome
            .metrics()
            .map(|m| key.score(m))
            .filter(|score| score.is_finite())
    };
    let mut ranked: Vec<&SweepEntry> = entries.iter().collect();
    ranked.sort_by(|a, b| {
        match (finite_score(a), finite_score(b)) {
            (Some(sa), Some(sb)) => return sb.total_cmp(&sa),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => {}
        }
        match (a.outcome.is_failed(), b.outcome.is_failed()) {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            _ => Ordering::Equal,
        }
    });
    ranked
}

/// Spread of total return across the candidates of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSensitivity {
    pub name: String,
    pub runs: usize,
    pub failed: usize,
    pub min_return: Option<f64>,
    pub max_return: Option<f64>,
}

impl ParameterSensitivity {
    pub fn spread(&self) -> Option<f64> {
        match (self.min_return, self.max_return) {
            (Some(lo), Some(hi)) => Some(hi - lo),
            _ => None,
        }
    }
}

/// Groups entries by perturbed parameter, in first-seen order.
pub fn sensitivity(entries: &[SweepEntry]) -> Vec<ParameterSensitivity> {
    let mut summaries: Vec<ParameterSensitivity> = Vec::new();

    for entry in entries {
        let idx = match summaries.iter().position(|s| s.name == entry.parameter) {
            Some(i) => i,
            None => {
                summaries.push(ParameterSensitivity {
                    name: entry.parameter.clone(),
                    runs: 0,
                    failed: 0,
                    min_return: None,
                    max_return: None,
                });
                summaries.len() - 1
            }
        };
        let summary = &mut summaries[idx];
        summary.runs += 1;
        match entry.outcome.metrics() {
            Some(m) => {
                let r = m.total_return;
                summary.min_return = Some(summary.min_return.map_or(r, |lo| lo.min(r)));
                summary.max_return = Some(summary.max_return.map_or(r, |hi| hi.max(r)));
            }
            None => summary.failed += 1,
        }
    }

    summaries
}
