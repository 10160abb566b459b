//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::{CsvAdapter, ValuesCsvReport, write_bars};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::svg_chart::SvgChartReport;
use crate::domain::backtest::{BacktestResult, run_backtest};
use crate::domain::bar::Bar;
use crate::domain::config_validation::{RunConfig, load_log_level, load_run_config, unknown_keys};
use crate::domain::dataset::MultiSymbolDataset;
use crate::domain::error::CrossrevError;
use crate::domain::metrics::Metrics;
use crate::domain::portfolio::EquityPoint;
use crate::domain::resample::resample;
use crate::domain::strategy::{CrossSectionalStrategy, RebalanceStats};
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_CHART_PATH: &str = "portfolio_value.svg";

#[derive(Parser, Debug)]
#[command(
    name = "crossrev",
    about = "Cross-sectional mean-reversion backtester"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resample the bars, run the strategy and write the value chart
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [report] chart_path
        #[arg(long)]
        chart: Option<PathBuf>,
        /// Overrides [report] values_path
        #[arg(long)]
        values: Option<PathBuf>,
    },
    /// Write the resampled bar table without backtesting
    Resample {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Check the configuration and the input table
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Everything a backtest run produces.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub result: BacktestResult,
    pub metrics: Metrics,
    /// The strategy's portfolio value at every bar.
    pub values: Vec<EquityPoint>,
    pub stats: RebalanceStats,
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            chart,
            values,
        } => run_backtest_command(&config, chart, values),
        Command::Resample { config, output } => run_resample_command(&config, &output),
        Command::Validate { config } => run_validate_command(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level;
/// a second call is a no-op.
pub fn init_logging(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse the config file, start logging, then validate every section.
pub fn load_config(path: &Path) -> Result<RunConfig, CrossrevError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    init_logging(load_log_level(&adapter)?);
    info!(path = %path.display(), "loaded config");

    for (section, key) in unknown_keys(&adapter) {
        warn!(%section, %key, "ignoring unknown config key");
    }
    load_run_config(&adapter)
}

/// Load, resample and date-window the bar table; symbols outside the universe
/// are dropped.
pub fn prepare_bars(
    run: &RunConfig,
    data_port: &dyn DataPort,
) -> Result<Vec<Bar>, CrossrevError> {
    let raw = data_port.load_bars()?;
    if raw.is_empty() {
        return Err(CrossrevError::NoData {
            reason: "input table has no rows".to_string(),
        });
    }

    let resampled = resample(&raw, &run.resample);
    let bars: Vec<Bar> = resampled
        .into_iter()
        .filter(|b| run.backtest.in_window(&b.timestamp))
        .filter(|b| run.universe.includes(&b.symbol))
        .collect();

    if bars.is_empty() {
        return Err(CrossrevError::NoData {
            reason: "no bars left after resampling and filtering".to_string(),
        });
    }

    info!(
        input = raw.len(),
        output = bars.len(),
        frequency = %run.resample.frequency,
        timezone = %run.resample.timezone,
        "resampled bars"
    );
    Ok(bars)
}

pub fn run_backtest_pipeline(
    run: &RunConfig,
    data_port: &dyn DataPort,
) -> Result<PipelineOutcome, CrossrevError> {
    let bars = prepare_bars(run, data_port)?;
    let mut dataset = MultiSymbolDataset::from_bars(bars)?;
    run.universe.apply(&mut dataset)?;

    let mut strategy = CrossSectionalStrategy::new(run.strategy.clone(), &dataset);
    let result = run_backtest(&dataset, &mut strategy, &run.backtest)?;

    let metrics = Metrics::compute(
        &result.portfolio,
        run.resample.frequency.periods_per_year(),
        run.backtest.risk_free_rate,
    );
    metrics.log_summary(run.backtest.initial_capital);

    let stats = strategy.stats();
    info!(
        events = stats.events,
        skipped = stats.skipped,
        orders = stats.orders,
        fills = result.fills,
        rejected = result.rejected_orders,
        "rebalancing summary"
    );

    Ok(PipelineOutcome {
        result,
        metrics,
        values: strategy.into_values(),
        stats,
    })
}

fn run_backtest_command(
    config_path: &Path,
    chart: Option<PathBuf>,
    values: Option<PathBuf>,
) -> Result<(), CrossrevError> {
    let run = load_config(config_path)?;
    let data_port = CsvAdapter::new(run.data.clone());
    let outcome = run_backtest_pipeline(&run, &data_port)?;

    let chart_path = chart
        .or_else(|| run.report.chart_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CHART_PATH));
    SvgChartReport.write(&outcome.values, run.backtest.initial_capital, &chart_path)?;

    if let Some(values_path) = values.or_else(|| run.report.values_path.clone()) {
        ValuesCsvReport.write(&outcome.values, run.backtest.initial_capital, &values_path)?;
    }
    Ok(())
}

fn run_resample_command(config_path: &Path, output: &Path) -> Result<(), CrossrevError> {
    let run = load_config(config_path)?;
    let data_port = CsvAdapter::new(run.data.clone());
    let bars = prepare_bars(&run, &data_port)?;
    write_bars(output, &bars)?;
    info!(path = %output.display(), bars = bars.len(), "wrote resampled bars");
    Ok(())
}

fn run_validate_command(config_path: &Path) -> Result<(), CrossrevError> {
    let run = load_config(config_path)?;
    info!(
        frequency = %run.resample.frequency,
        rebalance_interval = run.strategy.rebalance_interval,
        vol_window = run.strategy.vol_window,
        z_threshold = run.strategy.signal.z_threshold,
        return_transform = %run.strategy.signal.return_transform,
        "strategy parameters"
    );

    let data_port = CsvAdapter::new(run.data.clone());
    let bars = prepare_bars(&run, &data_port)?;
    let mut dataset = MultiSymbolDataset::from_bars(bars)?;
    run.universe.apply(&mut dataset)?;

    let timeline = dataset.timeline();
    if let (Some(first), Some(last)) = (timeline.first(), timeline.last()) {
        info!(
            symbols = dataset.series.len(),
            bars = dataset.bar_count(),
            first = %first,
            last = %last,
            "input data is usable"
        );
    }
    println!("configuration is valid");
    Ok(())
}
