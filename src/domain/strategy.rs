//! Strategy capability and the built-in strategies.
//!
//! A strategy maps the bars seen so far, the run's parameters and the
//! current position (signed share count) to a target position. It must be
//! deterministic and free of side effects so runs are reproducible.

use super::bar::Bar;
use super::params::ParameterSet;

/// Failure raised by a strategy callback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct StrategyFailure(pub String);

pub trait Strategy {
    fn target_position(
        &self,
        history: &[Bar],
        params: &ParameterSet,
        position: f64,
    ) -> Result<f64, StrategyFailure>;
}

impl<F> Strategy for F
where
    F: Fn(&[Bar], &ParameterSet, f64) -> Result<f64, StrategyFailure>,
{
    fn target_position(
        &self,
        history: &[Bar],
        params: &ParameterSet,
        position: f64,
    ) -> Result<f64, StrategyFailure> {
        self(history, params, position)
    }
}

pub const BUILTIN_NAMES: &[&str] = &["sma_trend", "momentum"];

/// Looks up a built-in strategy by its configuration name.
pub fn builtin(name: &str) -> Option<Box<dyn Strategy + Send + Sync>> {
    match name.trim().to_lowercase().as_str() {
        "sma_trend" => Some(Box::new(SmaTrend)),
        "momentum" => Some(Box::new(Momentum)),
        _ => None,
    }
}

/// Long `size` shares while the last price is above its simple moving
/// average over `lookback` bars, flat otherwise.
///
/// Parameters: `lookback` (default 20), `size` (default 100).
#[derive(Debug, Clone, Copy, Default)]
pub struct SmaTrend;

impl Strategy for SmaTrend {
    fn target_position(
        &self,
        history: &[Bar],
        params: &ParameterSet,
        _position: f64,
    ) -> Result<f64, StrategyFailure> {
        let lookback = read_lookback(params, 20.0)?;
        let size = params.get_or("size", 100.0);

        let Some(average) = sma(history, lookback) else {
            return Ok(0.0);
        };
        let last = history[history.len() - 1].price;
        Ok(if last > average { size } else { 0.0 })
    }
}

/// Rate-of-change momentum. Goes long `size` when the return over
/// `lookback` bars exceeds `threshold`; when it falls below `-threshold`
/// goes short if `allow_short` is non-zero, else flat. Holds otherwise.
///
/// Parameters: `lookback` (default 10), `size` (default 100),
/// `threshold` (default 0), `allow_short` (default 0).
#[derive(Debug, Clone, Copy, Default)]
pub struct Momentum;

impl Strategy for Momentum {
    fn target_position(
        &self,
        history: &[Bar],
        params: &ParameterSet,
        position: f64,
    ) -> Result<f64, StrategyFailure> {
        let lookback = read_lookback(params, 10.0)?;
        let size = params.get_or("size", 100.0);
        let threshold = params.get_or("threshold", 0.0);
        let allow_short = params.get_or("allow_short", 0.0) != 0.0;

        let Some(change) = rate_of_change(history, lookback) else {
            return Ok(0.0);
        };
        if change > threshold {
            Ok(size)
        } else if change < -threshold {
            Ok(if allow_short { -size } else { 0.0 })
        } else {
            Ok(position)
        }
    }
}

fn read_lookback(params: &ParameterSet, default: f64) -> Result<usize, StrategyFailure> {
    let raw = params.get_or("lookback", default);
    if !raw.is_finite() || raw < 1.0 {
        return Err(StrategyFailure(format!(
            "lookback must be at least 1, got {raw}"
        )));
    }
    Ok(raw.round() as usize)
}

/// Mean price of the last `period` bars; `None` until enough bars exist.
fn sma(history: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || history.len() < period {
        return None;
    }
    let window = &history[history.len() - period..];
    Some(window.iter().map(|b| b.price).sum::<f64>() / period as f64)
}

/// last / price `period` bars earlier - 1; `None` until enough bars exist.
fn rate_of_change(history: &[Bar], period: usize) -> Option<f64> {
    if history.len() <= period {
        return None;
    }
    let last = history[history.len() - 1].price;
    let base = history[history.len() - 1 - period].price;
    if base == 0.0 {
        return None;
    }
    Some(last / base - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(prices: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Bar::new(start + chrono::Duration::days(i as i64), p, 1.0))
            .collect()
    }

    #[test]
    fn sma_needs_full_window() {
        let history = bars(&[1.0, 2.0]);
        assert_eq!(sma(&history, 3), None);
        assert_eq!(sma(&history, 2), Some(1.5));
    }

    #[test]
    fn rate_of_change_over_period() {
        let history = bars(&[100.0, 105.0, 110.0]);
        let roc = rate_of_change(&history, 2).unwrap();
        assert!((roc - 0.10).abs() < 1e-12);
        assert_eq!(rate_of_change(&history, 3), None);
    }

    #[test]
    fn sma_trend_long_above_average() {
        let params = ParameterSet::new().with("lookback", 3.0).with("size", 10.0);
        let rising = bars(&[1.0, 2.0, 3.0]);
        assert_eq!(SmaTrend.target_position(&rising, &params, 0.0), Ok(10.0));
        let falling = bars(&[3.0, 2.0, 1.0]);
        assert_eq!(SmaTrend.target_position(&falling, &params, 10.0), Ok(0.0));
    }

    #[test]
    fn sma_trend_flat_during_warmup() {
        let params = ParameterSet::new().with("lookback", 5.0);
        let history = bars(&[1.0, 2.0]);
        assert_eq!(SmaTrend.target_position(&history, &params, 0.0), Ok(0.0));
    }

    #[test]
    fn invalid_lookback_is_a_failure() {
        let params = ParameterSet::new().with("lookback", 0.0);
        let history = bars(&[1.0, 2.0, 3.0]);
        assert!(SmaTrend.target_position(&history, &params, 0.0).is_err());
        let params = ParameterSet::new().with("lookback", f64::NAN);
        assert!(Momentum.target_position(&history, &params, 0.0).is_err());
    }

    #[test]
    fn momentum_shorts_only_when_allowed() {
        let history = bars(&[100.0, 90.0, 80.0]);
        let long_only = ParameterSet::new().with("lookback", 2.0).with("size", 5.0);
        assert_eq!(Momentum.target_position(&history, &long_only, 5.0), Ok(0.0));
        let shorting = long_only.with_override("allow_short", 1.0);
        assert_eq!(Momentum.target_position(&history, &shorting, 0.0), Ok(-5.0));
    }

    #[test]
    fn momentum_holds_inside_threshold() {
        let history = bars(&[100.0, 100.5, 101.0]);
        let params = ParameterSet::new()
            .with("lookback", 2.0)
            .with("threshold", 0.05);
        assert_eq!(Momentum.target_position(&history, &params, 7.0), Ok(7.0));
    }

    #[test]
    fn closures_are_strategies() {
        let always_long =
            |_: &[Bar], p: &ParameterSet, _: f64| -> Result<f64, StrategyFailure> {
                Ok(p.get_or("size", 1.0))
            };
        let history = bars(&[1.0]);
        assert_eq!(
            always_long.target_position(&history, &ParameterSet::new(), 0.0),
            Ok(1.0)
        );
    }

    #[test]
    fn builtin_lookup() {
        for name in BUILTIN_NAMES {
            assert!(builtin(name).is_some(), "{name} should resolve");
        }
        assert!(builtin(" SMA_Trend ").is_some());
        assert!(builtin("unknown").is_none());
    }
}
