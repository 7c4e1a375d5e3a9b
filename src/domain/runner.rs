//! Bar-by-bar strategy replay.
//!
//! At each transition from bar `i-1` to bar `i` the strategy sees
//! `bars[..i]` only, so it can never observe the bar whose return it is
//! about to earn. Position changes execute at bar `i-1`'s price, the cost
//! model is charged, and the period return is booked against equity
//! before the step.

use chrono::NaiveDate;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use super::bar::Bar;
use super::cost::CostModel;
use super::error::WalkForwardError;
use super::params::ParameterSet;
use super::strategy::Strategy;
use super::trade::Trade;

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub initial_capital: f64,
    pub costs: CostModel,
    /// Wall-clock budget for a single run.
    pub max_duration: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            initial_capital: 100_000.0,
            costs: CostModel::free(),
            max_duration: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), WalkForwardError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(WalkForwardError::invalid_config(
                "validation",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// One entry per bar transition, in time order.
pub type ReturnSeries = Vec<ReturnPoint>;

#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub returns: ReturnSeries,
    pub trades: Vec<Trade>,
    pub final_equity: f64,
    pub total_cost: f64,
}

pub fn run<S: Strategy + ?Sized>(
    bars: &[Bar],
    params: &ParameterSet,
    strategy: &S,
    config: &RunConfig,
) -> Result<RunResult, WalkForwardError> {
    config.validate()?;

    let started = Instant::now();
    let mut cash = config.initial_capital;
    let mut position = 0.0_f64;
    let mut total_cost = 0.0_f64;
    let mut returns = Vec::with_capacity(bars.len().saturating_sub(1));
    let mut trades = Vec::new();

    for i in 1..bars.len() {
        let prev = &bars[i - 1];
        let curr = &bars[i];
        let equity_before = cash + position * prev.price;

        let target = ask_strategy(strategy, &bars[..i], params, position, prev.date)?;
        check_deadline(started, config.max_duration, params)?;

        let mut step_cost = 0.0;
        if let Some(mut trade) = Trade::for_change(prev.date, position, target, prev.price) {
            step_cost = config.costs.cost(trade.quantity, trade.price);
            trade.cost = step_cost;
            cash -= trade.signed_quantity() * trade.price + step_cost;
            position = target;
            trades.push(trade);
        }
        total_cost += step_cost;

        let equity_after = cash + position * curr.price;
        let value = if equity_before > 0.0 {
            (equity_after - equity_before) / equity_before
        } else {
            0.0
        };
        returns.push(ReturnPoint {
            date: curr.date,
            value,
        });
    }

    let final_equity = match bars.last() {
        Some(last) => cash + position * last.price,
        None => cash,
    };

    tracing::debug!(
        %params,
        bars = bars.len(),
        trades = trades.len(),
        final_equity,
        total_cost,
        "run complete"
    );

    Ok(RunResult {
        returns,
        trades,
        final_equity,
        total_cost,
    })
}

/// Checked after every strategy call, so the last step is guarded too.
fn check_deadline(
    started: Instant,
    limit: Option<Duration>,
    params: &ParameterSet,
) -> Result<(), WalkForwardError> {
    let Some(limit) = limit else {
        return Ok(());
    };
    let elapsed = started.elapsed();
    if elapsed > limit {
        tracing::warn!(?elapsed, ?limit, %params, "run aborted by wall-clock guard");
        return Err(WalkForwardError::RunTimeout { elapsed, limit });
    }
    Ok(())
}

fn ask_strategy<S: Strategy + ?Sized>(
    strategy: &S,
    history: &[Bar],
    params: &ParameterSet,
    position: f64,
    date: NaiveDate,
) -> Result<f64, WalkForwardError> {
    let failure = |reason: String| WalkForwardError::Strategy {
        timestamp: date,
        parameters: params.to_string(),
        reason,
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        strategy.target_position(history, params, position)
    }));

    match outcome {
        Ok(Ok(target)) if target.is_finite() => Ok(target),
        Ok(Ok(target)) => Err(failure(format!(
            "strategy returned non-finite target position {target}"
        ))),
        Ok(Err(e)) => Err(failure(e.to_string())),
        Err(payload) => Err(failure(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("strategy panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("strategy panicked: {s}")
    } else {
        "strategy panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::StrategyFailure;
    use approx::assert_relative_eq;
    use std::cell::Cell;

    fn bars(prices: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Bar::new(start + chrono::Duration::days(i as i64), p, 1.0))
            .collect()
    }

    fn hold(size: f64) -> impl Fn(&[Bar], &ParameterSet, f64) -> Result<f64, StrategyFailure> {
        move |_: &[Bar], _: &ParameterSet, _: f64| -> Result<f64, StrategyFailure> {
            Ok(size)
        }
    }

    fn config(capital: f64, costs: CostModel) -> RunConfig {
        RunConfig {
            initial_capital: capital,
            costs,
            max_duration: None,
        }
    }

    #[test]
    fn one_return_per_transition() {
        let bars = bars(&[10.0, 11.0, 12.0, 13.0]);
        let result = run(&bars, &ParameterSet::new(), &hold(0.0), &RunConfig::default()).unwrap();
        assert_eq!(result.returns.len(), 3);
        assert_eq!(result.returns[0].date, bars[1].date);
        assert!(result.returns.iter().all(|r| r.value == 0.0));
        assert!(result.trades.is_empty());
    }

    #[test]
    fn buy_and_hold_tracks_price() {
        let bars = bars(&[100.0, 110.0, 99.0]);
        let config = config(1_000.0, CostModel::free());
        let result = run(&bars, &ParameterSet::new(), &hold(10.0), &config).unwrap();

        // Step 1: 10 * (110 - 100) / 1000
        assert_relative_eq!(result.returns[0].value, 0.10, epsilon = 1e-9);
        // Step 2: 10 * (99 - 110) / 1100
        assert_relative_eq!(result.returns[1].value, -0.10, epsilon = 1e-9);
        assert_eq!(result.trades.len(), 1);
        assert_relative_eq!(result.final_equity, 990.0, epsilon = 1e-9);
    }

    #[test]
    fn costs_reduce_the_entry_period_return() {
        let bars = bars(&[100.0, 100.0]);
        let costs = CostModel::new(0.005, 1.0, 0.001).unwrap();
        let result = run(&bars, &ParameterSet::new(), &hold(50.0), &config(10_000.0, costs)).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_relative_eq!(result.trades[0].cost, 6.0, epsilon = 1e-9);
        assert_relative_eq!(result.total_cost, 6.0, epsilon = 1e-9);
        assert_relative_eq!(result.returns[0].value, -6.0 / 10_000.0, epsilon = 1e-9);
        assert_relative_eq!(result.final_equity, 9_994.0, epsilon = 1e-9);
    }

    #[test]
    fn strategy_never_sees_the_current_bar() {
        let bars = bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let calls = Cell::new(0usize);
        let probe = |history: &[Bar], _: &ParameterSet, _: f64| -> Result<f64, StrategyFailure> {
            let i = calls.get();
            calls.set(i + 1);
            // Call i decides the transition into bar i + 1.
            assert_eq!(history.len(), i + 1);
            assert_eq!(history.last().unwrap().price, (i + 1) as f64);
            Ok(0.0)
        };
        run(&bars, &ParameterSet::new(), &probe, &RunConfig::default()).unwrap();
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn trade_executes_at_decision_bar() {
        let bars = bars(&[10.0, 20.0, 30.0]);
        let enter_late = |history: &[Bar], _: &ParameterSet, _: f64| -> Result<f64, StrategyFailure> {
            Ok(if history.len() >= 2 { 1.0 } else { 0.0 })
        };
        let result = run(&bars, &ParameterSet::new(), &enter_late, &RunConfig::default()).unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].date, bars[1].date);
        assert_eq!(result.trades[0].price, 20.0);
    }

    #[test]
    fn strategy_error_carries_timestamp_and_params() {
        let bars = bars(&[1.0, 2.0, 3.0]);
        let params = ParameterSet::new().with("lookback", 3.0);
        let failing = |history: &[Bar], _: &ParameterSet, _: f64| -> Result<f64, StrategyFailure> {
            if history.len() == 2 {
                Err(StrategyFailure("boom".into()))
            } else {
                Ok(0.0)
            }
        };
        match run(&bars, &params, &failing, &RunConfig::default()) {
            Err(WalkForwardError::Strategy {
                timestamp,
                parameters,
                reason,
            }) => {
                assert_eq!(timestamp, bars[1].date);
                assert_eq!(parameters, "{lookback=3}");
                assert_eq!(reason, "boom");
            }
            other => panic!("expected Strategy error, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_target_is_a_strategy_error() {
        let bars = bars(&[1.0, 2.0]);
        let result = run(&bars, &ParameterSet::new(), &hold(f64::NAN), &RunConfig::default());
        assert!(matches!(result, Err(WalkForwardError::Strategy { .. })));
    }

    #[test]
    fn panicking_strategy_is_a_strategy_error() {
        let bars = bars(&[1.0, 2.0]);
        let panicky = |_: &[Bar], _: &ParameterSet, _: f64| -> Result<f64, StrategyFailure> {
            panic!("index out of range")
        };
        match run(&bars, &ParameterSet::new(), &panicky, &RunConfig::default()) {
            Err(WalkForwardError::Strategy { reason, .. }) => {
                assert!(reason.contains("index out of range"));
            }
            other => panic!("expected Strategy error, got {other:?}"),
        }
    }

    #[test]
    fn exceeded_time_budget_aborts() {
        let bars = bars(&[1.0, 2.0, 3.0]);
        let slow = |_: &[Bar], _: &ParameterSet, _: f64| -> Result<f64, StrategyFailure> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(0.0)
        };
        let config = RunConfig {
            max_duration: Some(Duration::from_millis(1)),
            ..RunConfig::default()
        };
        assert!(matches!(
            run(&bars, &ParameterSet::new(), &slow, &config),
            Err(WalkForwardError::RunTimeout { .. })
        ));
    }

    #[test]
    fn overrun_on_the_only_step_aborts() {
        let bars = bars(&[1.0, 2.0]);
        let slow = |_: &[Bar], _: &ParameterSet, _: f64| -> Result<f64, StrategyFailure> {
            std::thread::sleep(Duration::from_millis(50));
            Ok(1.0)
        };
        let config = RunConfig {
            max_duration: Some(Duration::from_millis(1)),
            ..RunConfig::default()
        };
        match run(&bars, &ParameterSet::new(), &slow, &config) {
            Err(WalkForwardError::RunTimeout { elapsed, limit }) => {
                assert!(elapsed > limit);
            }
            other => panic!("expected RunTimeout, got {other:?}"),
        }
    }

    #[test]
    fn fast_run_within_budget_completes() {
        let bars = bars(&[1.0, 2.0, 3.0]);
        let config = RunConfig {
            max_duration: Some(Duration::from_secs(60)),
            ..RunConfig::default()
        };
        assert!(run(&bars, &ParameterSet::new(), &hold(1.0), &config).is_ok());
    }

    #[test]
    fn short_input_yields_empty_result() {
        let one = bars(&[5.0]);
        let result = run(&one, &ParameterSet::new(), &hold(1.0), &RunConfig::default()).unwrap();
        assert!(result.returns.is_empty());
        assert!(result.trades.is_empty());
        assert_relative_eq!(result.final_equity, 100_000.0, epsilon = 1e-9);
    }

    #[test]
    fn non_positive_capital_rejected() {
        let bars = bars(&[1.0, 2.0]);
        let result = run(&bars, &ParameterSet::new(), &hold(0.0), &config(0.0, CostModel::free()));
        assert!(matches!(result, Err(WalkForwardError::InvalidConfig { .. })));
    }
}
