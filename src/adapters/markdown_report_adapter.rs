//! Markdown report adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use crate::domain::error::WalkForwardError;
use crate::domain::metrics::Metrics;
use crate::domain::split::WindowSummary;
use crate::domain::sweep::{ParameterSensitivity, RankKey, SweepEntry, SweepOutcome, rank};
use crate::domain::validation::{ValidationReport, WindowResult};
use crate::ports::report_port::ReportPort;

pub struct MarkdownReportAdapter {
    rank_key: RankKey,
}

impl MarkdownReportAdapter {
    pub fn new() -> Self {
        Self {
            rank_key: RankKey::TotalReturn,
        }
    }

    pub fn with_rank_key(rank_key: RankKey) -> Self {
        Self { rank_key }
    }

    pub fn render(&self, report: &ValidationReport, strategy: &str) -> String {
        let mut output = render_header(report, strategy);
        output.push_str(&render_windows(report));
        output.push_str(&render_performance(report));
        if !report.sweep.is_empty() {
            output.push_str(&render_sensitivity(&report.sensitivity));
            output.push_str(&render_sweep_runs(&rank(&report.sweep, self.rank_key)));
        }
        output
    }
}

impl Default for MarkdownReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for MarkdownReportAdapter {
    fn write(
        &self,
        report: &ValidationReport,
        strategy: &str,
        output_path: &Path,
    ) -> Result<(), WalkForwardError> {
        let content = self.render(report, strategy);
        fs::write(output_path, content)?;
        Ok(())
    }
}

fn render_header(report: &ValidationReport, strategy: &str) -> String {
    let mut output = format!("# Walk-Forward Validation: {strategy}\n\n");
    output.push_str(&format!("Parameters: `{}`\n\n", report.parameters));
    output
}

fn render_windows(report: &ValidationReport) -> String {
    let mut output = String::from("## Windows\n\n");
    output.push_str("| Window | Bars | Start | End | Final Equity |\n");
    output.push_str("|---|---:|---|---|---:|\n");
    output.push_str(&window_row("Training", &report.training));
    output.push_str(&window_row("Testing", &report.testing));
    output.push('\n');
    output
}

fn window_row(label: &str, result: &WindowResult) -> String {
    let WindowSummary { bars, start, end } = result.window;
    format!(
        "| {} | {} | {} | {} | {:.2} |\n",
        label,
        bars,
        start.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
        end.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
        result.final_equity,
    )
}

fn render_performance(report: &ValidationReport) -> String {
    let mut output = String::from("## Performance\n\n");
    output.push_str("| Metric | Training | Testing |\n");
    output.push_str("|---|---:|---:|\n");
    output.push_str(&metric_rows(&report.training.metrics, &report.testing.metrics));
    output.push_str(&format!(
        "\nOut-of-sample degradation: {:+.2}%\n",
        report.degradation() * 100.0
    ));
    output
}

fn metric_rows(training: &Metrics, testing: &Metrics) -> String {
    let pct = |v: f64| format!("{:.2}%", v * 100.0);
    let ratio = |v: f64| format!("{:.2}", v);
    let rows: [(&str, String, String); 8] = [
        ("Total Return", pct(training.total_return), pct(testing.total_return)),
        (
            "Annualized Return",
            pct(training.annualized_return),
            pct(testing.annualized_return),
        ),
        ("Volatility", pct(training.volatility), pct(testing.volatility)),
        ("Sharpe Ratio", ratio(training.sharpe_ratio), ratio(testing.sharpe_ratio)),
        ("Sortino Ratio", ratio(training.sortino_ratio), ratio(testing.sortino_ratio)),
        ("Max Drawdown", pct(training.max_drawdown), pct(testing.max_drawdown)),
        (
            "Trades",
            training.trade_count.to_string(),
            testing.trade_count.to_string(),
        ),
        ("Total Cost", ratio(training.total_cost), ratio(testing.total_cost)),
    ];
    rows.iter()
        .map(|(name, train, test)| format!("| {name} | {train} | {test} |\n"))
        .collect()
}

fn render_sensitivity(sensitivity: &[ParameterSensitivity]) -> String {
    let mut output = String::from("\n## Parameter Sensitivity\n\n");
    output.push_str("| Parameter | Runs | Failed | Min Return | Max Return | Spread |\n");
    output.push_str("|---|---:|---:|---:|---:|---:|\n");
    for s in sensitivity {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            s.name,
            s.runs,
            s.failed,
            pct_or_dash(s.min_return),
            pct_or_dash(s.max_return),
            pct_or_dash(s.spread()),
        ));
    }
    output
}

fn render_sweep_runs(ranked: &[&SweepEntry]) -> String {
    let mut output = String::from("\n## Sweep Runs (ranked)\n\n");
    output.push_str("| Rank | Parameter | Value | Total Return | Max Drawdown | Sharpe | Trades |\n");
    output.push_str("|---:|---|---:|---:|---:|---:|---:|\n");
    for (i, entry) in ranked.iter().enumerate() {
        let row = match &entry.outcome {
            SweepOutcome::Completed(m) => format!(
                "| {} | {} | {} | {:.2}% | {:.2}% | {:.2} | {} |\n",
                i + 1,
                entry.parameter,
                entry.value,
                m.total_return * 100.0,
                m.max_drawdown * 100.0,
                m.sharpe_ratio,
                m.trade_count,
            ),
            SweepOutcome::Failed { reason } => format!(
                "| {} | {} | {} | FAILED: {} | - | - | - |\n",
                i + 1,
                entry.parameter,
                entry.value,
                escape_cell(reason),
            ),
        };
        output.push_str(&row);
    }
    output
}

fn pct_or_dash(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v * 100.0))
        .unwrap_or_else(|| "-".into())
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
