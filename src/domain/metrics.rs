//! Performance metrics over a return series.

use super::runner::ReturnPoint;
use super::trade::Trade;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsConfig {
    pub periods_per_year: f64,
    /// Annual rate, converted to a per-period rate for the ratios.
    pub risk_free_rate: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            periods_per_year: TRADING_DAYS_PER_YEAR,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub trade_count: usize,
    pub total_cost: f64,
    pub periods: usize,
}

impl Metrics {
    /// An empty return series yields zeroed metrics, not an error.
    pub fn compute(returns: &[ReturnPoint], trades: &[Trade], config: &MetricsConfig) -> Self {
        let trade_count = trades.len();
        let total_cost = trades.iter().map(|t| t.cost).sum();

        if returns.is_empty() {
            return Metrics {
                trade_count,
                total_cost,
                ..Metrics::default()
            };
        }

        let values: Vec<f64> = returns.iter().map(|r| r.value).collect();
        let periods = values.len();

        let growth: f64 = values.iter().map(|r| 1.0 + r).product();
        let total_return = growth - 1.0;

        let years = periods as f64 / config.periods_per_year;
        let annualized_return = if years > 0.0 && growth > 0.0 && growth.is_finite() {
            growth.powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&values);

        let period_rf = config.risk_free_rate / config.periods_per_year;
        let (volatility, sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(&values, period_rf, config.periods_per_year);

        Metrics {
            total_return,
            annualized_return,
            volatility,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            trade_count,
            total_cost,
            periods,
        }
    }
}

/// Largest peak-to-trough decline of cumulative equity (starting at 1.0),
/// as a fraction of the peak, and the longest run of periods spent below a
/// prior peak.
fn compute_drawdown(returns: &[f64]) -> (f64, usize) {
    let mut equity = 1.0_f64;
    let mut peak = equity;
    let mut max_dd = 0.0_f64;
    let mut current_duration = 0usize;
    let mut max_duration = 0usize;

    for r in returns {
        equity *= 1.0 + r;
        if equity >= peak {
            peak = equity;
            current_duration = 0;
            continue;
        }
        if peak > 0.0 {
            let dd = (peak - equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
        current_duration += 1;
        if current_duration > max_duration {
            max_duration = current_duration;
        }
    }

    (max_dd, max_duration)
}

/// (annualized volatility, Sharpe, Sortino)
fn compute_risk_adjusted(returns: &[f64], period_rf: f64, periods_per_year: f64) -> (f64, f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;

    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let annualizer = periods_per_year.sqrt();

    let excess_return = mean - period_rf;

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * annualizer
    } else {
        0.0
    };

    let downside_sum: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sum / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * annualizer
    } else {
        0.0
    };

    (stddev * annualizer, sharpe, sortino)
}
