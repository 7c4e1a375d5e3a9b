//! CLI definition and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::markdown_report_adapter::MarkdownReportAdapter;
use crate::domain::bar::Bar;
use crate::domain::config_validation::{
    DataRequest, build_data_request, build_parameters, build_perturbations,
    build_validation_config, strategy_name, validate_config,
};
use crate::domain::error::WalkForwardError;
use crate::domain::metrics::Metrics;
use crate::domain::params::ParameterSet;
use crate::domain::split::{WindowSummary, split};
use crate::domain::strategy::{Strategy, builtin};
use crate::domain::sweep::{self, Perturbation, RankKey, SweepEntry, SweepOutcome};
use crate::domain::validation::{self, ValidationConfig};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "walkforward",
    about = "Walk-forward and out-of-sample strategy validation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run training/testing validation and write a Markdown report
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Ordering of the sweep table in the report
        #[arg(long, value_enum, default_value_t = RankBy::TotalReturn)]
        rank_by: RankBy,
    },
    /// Run the parameter sweep over the whole series
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_enum, default_value_t = RankBy::TotalReturn)]
        rank_by: RankBy,
    },
    /// Show the training and testing windows
    Split {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate the configuration without running anything
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankBy {
    TotalReturn,
    Sharpe,
    Drawdown,
}

impl From<RankBy> for RankKey {
    fn from(by: RankBy) -> Self {
        match by {
            RankBy::TotalReturn => RankKey::TotalReturn,
            RankBy::Sharpe => RankKey::SharpeRatio,
            RankBy::Drawdown => RankKey::MaxDrawdown,
        }
    }
}

/// Everything a run needs, built and validated from one config file.
pub struct Settings {
    pub data: DataRequest,
    pub validation: ValidationConfig,
    pub strategy_name: String,
    pub strategy: Box<dyn Strategy + Send + Sync>,
    pub parameters: ParameterSet,
    pub perturbations: Vec<Perturbation>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("data", &self.data)
            .field("validation", &self.validation)
            .field("strategy_name", &self.strategy_name)
            .field("parameters", &self.parameters)
            .field("perturbations", &self.perturbations)
            .finish_non_exhaustive()
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Validate {
            config,
            output,
            rank_by,
        } => run_validate(&config, output.as_deref(), rank_by.into()),
        Command::Sweep { config, rank_by } => run_sweep(&config, rank_by.into()),
        Command::Split { config } => run_split(&config),
        Command::Check { config } => run_check(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

pub fn build_settings(config: &dyn ConfigPort) -> Result<Settings, WalkForwardError> {
    validate_config(config)?;
    let strategy_name = strategy_name(config)?;
    let strategy = builtin(&strategy_name).ok_or_else(|| {
        WalkForwardError::invalid_config("strategy", "name", "unknown strategy")
    })?;
    Ok(Settings {
        data: build_data_request(config)?,
        validation: build_validation_config(config)?,
        strategy_name,
        strategy,
        parameters: build_parameters(config)?,
        perturbations: build_perturbations(config)?,
    })
}

fn fail(err: WalkForwardError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

/// Loads and validates settings, printing the error on failure.
fn prepare(config_path: &Path) -> Result<Settings, ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    build_settings(&adapter).map_err(fail)
}

fn load_bars(data_port: &dyn DataPort, request: &DataRequest) -> Result<Vec<Bar>, WalkForwardError> {
    let bars = data_port.fetch_bars(&request.symbol, request.start, request.end)?;
    if bars.is_empty() {
        return Err(WalkForwardError::Data {
            reason: format!("no bars for {} in the requested range", request.symbol),
        });
    }
    eprintln!("Loaded {} bars for {}", bars.len(), request.symbol);
    Ok(bars)
}

pub fn run_validate(config_path: &Path, output: Option<&Path>, rank_key: RankKey) -> ExitCode {
    let settings = match prepare(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let data_port = CsvAdapter::new(settings.data.dir.clone());
    let reporter = MarkdownReportAdapter::with_rank_key(rank_key);
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("report.md"));
    run_validation_pipeline(&data_port, &reporter, &settings, &output)
}

/// Data fetch, validation, console summary and report, against any ports.
pub fn run_validation_pipeline(
    data_port: &dyn DataPort,
    reporter: &dyn ReportPort,
    settings: &Settings,
    output: &Path,
) -> ExitCode {
    let bars = match load_bars(data_port, &settings.data) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };

    eprintln!(
        "Validating {} with {} (split ratio {})",
        settings.strategy_name, settings.parameters, settings.validation.split_ratio
    );
    let report = match validation::validate(
        &bars,
        &settings.parameters,
        &settings.perturbations,
        settings.strategy.as_ref(),
        &settings.validation,
    ) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    eprintln!("\n=== Training ===");
    print_window(&report.training.window);
    print_metrics(&report.training.metrics);
    eprintln!("\n=== Testing ===");
    print_window(&report.testing.window);
    print_metrics(&report.testing.metrics);
    eprintln!(
        "\nOut-of-sample degradation: {:+.2}%",
        report.degradation() * 100.0
    );
    if !report.sweep.is_empty() {
        eprintln!(
            "Sweep: {} runs, {} failed",
            report.sweep.len(),
            report.failed_sweep_runs()
        );
    }

    match reporter.write(&report, &settings.strategy_name, output) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

pub fn run_sweep(config_path: &Path, rank_key: RankKey) -> ExitCode {
    let settings = match prepare(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let data_port = CsvAdapter::new(settings.data.dir.clone());
    run_sweep_pipeline(&data_port, &settings, rank_key)
}

pub fn run_sweep_pipeline(
    data_port: &dyn DataPort,
    settings: &Settings,
    rank_key: RankKey,
) -> ExitCode {
    if settings.perturbations.is_empty() {
        eprintln!("error: no [sweep] entries configured");
        return ExitCode::from(2);
    }
    let bars = match load_bars(data_port, &settings.data) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };

    let entries = match sweep::sweep(
        &settings.parameters,
        &settings.perturbations,
        &bars,
        settings.strategy.as_ref(),
        &settings.validation.sweep,
    ) {
        Ok(e) => e,
        Err(e) => return fail(e),
    };

    eprintln!("\n=== Sweep ({} runs) ===", entries.len());
    print_ranked(&sweep::rank(&entries, rank_key));

    eprintln!("\n=== Sensitivity ===");
    for s in sweep::sensitivity(&entries) {
        match s.spread() {
            Some(spread) => eprintln!(
                "  {}: {} runs, {} failed, return spread {:.2}%",
                s.name,
                s.runs,
                s.failed,
                spread * 100.0
            ),
            None => eprintln!("  {}: {} runs, all failed", s.name, s.runs),
        }
    }
    ExitCode::SUCCESS
}

pub fn run_split(config_path: &Path) -> ExitCode {
    let settings = match prepare(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let data_port = CsvAdapter::new(settings.data.dir.clone());
    let bars = match load_bars(&data_port, &settings.data) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };

    match split(&bars, settings.validation.split_ratio) {
        Ok((training, testing)) => {
            eprintln!("\nTraining:");
            print_window(&WindowSummary::of(training));
            eprintln!("Testing:");
            print_window(&WindowSummary::of(testing));
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

pub fn run_check(config_path: &Path) -> ExitCode {
    let settings = match prepare(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    eprintln!("Config validated successfully");
    eprintln!("\nData:");
    eprintln!("  dir:    {}", settings.data.dir.display());
    eprintln!("  symbol: {}", settings.data.symbol);
    eprintln!("\nStrategy: {}", settings.strategy_name);
    eprintln!("  parameters: {}", settings.parameters);
    for p in &settings.perturbations {
        let values: Vec<String> = p.candidates.iter().map(|v| v.to_string()).collect();
        eprintln!("  sweep {}: {}", p.name, values.join(", "));
    }
    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn print_window(window: &WindowSummary) {
    match (window.start, window.end) {
        (Some(start), Some(end)) => {
            eprintln!("  {} bars, {} to {}", window.bars, start, end)
        }
        _ => eprintln!("  {} bars", window.bars),
    }
}

fn print_metrics(m: &Metrics) {
    eprintln!("  Total Return:   {:.2}%", m.total_return * 100.0);
    eprintln!("  Annualized:     {:.2}%", m.annualized_return * 100.0);
    eprintln!("  Sharpe Ratio:   {:.2}", m.sharpe_ratio);
    eprintln!("  Max Drawdown:   -{:.1}%", m.max_drawdown * 100.0);
    eprintln!("  Trades:         {}", m.trade_count);
    eprintln!("  Total Cost:     {:.2}", m.total_cost);
}

fn print_ranked(ranked: &[&SweepEntry]) {
    for (i, entry) in ranked.iter().enumerate() {
        match &entry.outcome {
            SweepOutcome::Completed(m) => eprintln!(
                "  {:>3}. {}={:<10} return {:>8.2}%  sharpe {:>6.2}  drawdown -{:.1}%",
                i + 1,
                entry.parameter,
                entry.value,
                m.total_return * 100.0,
                m.sharpe_ratio,
                m.max_drawdown * 100.0,
            ),
            SweepOutcome::Failed { reason } => eprintln!(
                "  {:>3}. {}={:<10} FAILED: {}",
                i + 1,
                entry.parameter,
                entry.value,
                reason
            ),
        }
    }
}
