//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestResult, Engine};
use crate::domain::config_validation::{
    DataSource, RunSettings, StrategySettings, load_run_settings, load_strategy_settings,
    load_sweep_grid,
};
use crate::domain::error::NavtraderError;
use crate::domain::feed::BarFeed;
use crate::domain::signal::{ParamSet, annotate_all, build_provider};
use crate::domain::sweep::{ParamGrid, SweepOutcome, run_sweep};
use crate::domain::universe::load_histories;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "navtrader", about = "Signal-driven multi-asset backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single backtest
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for nav.csv, audit.csv and trades.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run every combination of the [sweep] grid
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Copy the universe's CSV files into the configured SQLite database
    Import {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding <ASSET>.csv files
        #[arg(long)]
        from: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run { config, output } => run_backtest(&config, output.as_deref()),
        Command::Sweep { config } => run_sweep_command(&config),
        Command::Validate { config } => run_validate(&config),
        Command::Import { config, from } => run_import(&config, &from),
    }
}

fn fail(err: NavtraderError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    info!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Relative data paths are taken relative to the config file.
pub fn resolve_path(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match config_path.parent() {
        Some(parent) => parent.join(path),
        None => path.to_path_buf(),
    }
}

pub fn open_data_port(
    config_path: &Path,
    source: &DataSource,
) -> Result<Box<dyn DataPort>, NavtraderError> {
    match source {
        DataSource::Csv { dir } => Ok(Box::new(CsvAdapter::new(resolve_path(config_path, dir)))),
        #[cfg(feature = "sqlite")]
        DataSource::Sqlite { path, pool_size } => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            let path = resolve_path(config_path, path);
            info!("Opening SQLite store {}", path.display());
            Ok(Box::new(SqliteAdapter::open(&path, *pool_size)?))
        }
        #[cfg(not(feature = "sqlite"))]
        DataSource::Sqlite { .. } => Err(NavtraderError::invalid(
            "backtest",
            "data_source",
            "built without the sqlite feature",
        )),
    }
}

fn load_all(config_path: &Path) -> Result<(FileConfigAdapter, RunSettings, StrategySettings), ExitCode> {
    let adapter = load_config(config_path)?;
    let settings = load_run_settings(&adapter).map_err(fail)?;
    let strategy = load_strategy_settings(&adapter).map_err(fail)?;
    Ok((adapter, settings, strategy))
}

fn run_backtest(config_path: &Path, output: Option<&Path>) -> ExitCode {
    let (_, settings, strategy) = match load_all(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let data_port = match open_data_port(config_path, &settings.data_source) {
        Ok(port) => port,
        Err(e) => return fail(e),
    };
    let report_port = CsvReportAdapter::new();
    let report = output.map(|dir| (&report_port as &dyn ReportPort, dir));

    match run_backtest_pipeline(data_port.as_ref(), &settings, &strategy, report) {
        Ok(result) => {
            println!("{}", format_summary(&result));
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Load, annotate, run, and optionally export one backtest.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    settings: &RunSettings,
    strategy: &StrategySettings,
    report: Option<(&dyn ReportPort, &Path)>,
) -> Result<BacktestResult, NavtraderError> {
    let provider = build_provider(&strategy.name, &strategy.params)?;
    info!(
        "Strategy {} [{}] on {}",
        provider.name(),
        strategy.params,
        settings.backtest.universe.join(", ")
    );

    let histories = load_histories(
        data_port,
        &settings.backtest.universe,
        settings.start_date,
        settings.end_date,
    )?;
    let annotated = annotate_all(&histories, provider.as_ref());
    let feed = BarFeed::from_map(&settings.backtest.universe, annotated)?;

    let engine = Engine::new(settings.backtest.clone())?;
    let result = engine.run(&feed)?;

    if let Some((port, dir)) = report {
        port.write(&result, dir)?;
    }
    Ok(result)
}

pub fn format_summary(result: &BacktestResult) -> String {
    let mut lines = vec![
        "=== Results ===".to_string(),
        format!("Initial Cash:     {:.2}", result.initial_cash),
        format!("Final Equity:     {:.2}", result.final_equity),
        format!("Final Cash:       {:.2}", result.final_cash),
        format!("Total Return:     {:.2}%", result.total_return() * 100.0),
        format!("Total Fills:      {}", result.log.total_trades()),
        format!("Closed Trades:    {}", result.log.closed_trades().len()),
        format!("Skipped Bars:     {}", result.log.skipped().len()),
        String::new(),
        "=== Fills per Asset ===".to_string(),
    ];
    for (asset, count) in result.log.trade_counts() {
        lines.push(format!("  {:<12} {}", asset, count));
    }
    lines.join("\n")
}

fn run_sweep_command(config_path: &Path) -> ExitCode {
    let (adapter, settings, strategy) = match load_all(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let grid = match load_sweep_grid(&adapter, &strategy) {
        Ok(g) => g,
        Err(e) => return fail(e),
    };
    if grid.is_empty() {
        eprintln!("error: no [sweep] parameters configured");
        return ExitCode::from(2);
    }

    let data_port = match open_data_port(config_path, &settings.data_source) {
        Ok(port) => port,
        Err(e) => return fail(e),
    };
    match run_sweep_pipeline(data_port.as_ref(), &settings, &strategy, &grid) {
        Ok(outcomes) => {
            for outcome in &outcomes {
                println!("{}", format_outcome(outcome));
            }
            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            info!("{} combinations, {} failed", outcomes.len(), failed);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Loads data once, then runs every grid point. Swept values override the
/// matching `[strategy]` parameters; the rest keep their configured values.
pub fn run_sweep_pipeline(
    data_port: &dyn DataPort,
    settings: &RunSettings,
    strategy: &StrategySettings,
    grid: &ParamGrid,
) -> Result<Vec<SweepOutcome>, NavtraderError> {
    let histories = load_histories(
        data_port,
        &settings.backtest.universe,
        settings.start_date,
        settings.end_date,
    )?;

    Ok(run_sweep(grid, &histories, &settings.backtest, |combo: &ParamSet| {
        let mut params = strategy.params.clone();
        for (name, value) in combo.iter() {
            params.insert(name, value);
        }
        build_provider(&strategy.name, &params)
    }))
}

pub fn format_outcome(outcome: &SweepOutcome) -> String {
    match &outcome.result {
        Ok(summary) => format!(
            "{}  final_equity={:.2} return={:.2}% fills={}",
            outcome.params,
            summary.final_equity,
            summary.total_return * 100.0,
            summary.total_fills
        ),
        Err(e) => format!("{}  FAILED: {}", outcome.params, e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let (adapter, settings, strategy) = match load_all(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let grid = match load_sweep_grid(&adapter, &strategy) {
        Ok(g) => g,
        Err(e) => return fail(e),
    };

    println!("Universe:  {}", settings.backtest.universe.join(", "));
    println!("Strategy:  {} [{}]", strategy.name, strategy.params);
    if !grid.is_empty() {
        println!("Sweep:     {} combinations", grid.size());
    }
    println!("Configuration is valid");
    ExitCode::SUCCESS
}

#[cfg(feature = "sqlite")]
fn run_import(config_path: &Path, from: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match load_run_settings(&adapter).and_then(|settings| import_csv(config_path, from, &settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

/// Loads the universe from CSV files under `from` and upserts it into the
/// configured SQLite store.
#[cfg(feature = "sqlite")]
pub fn import_csv(
    config_path: &Path,
    from: &Path,
    settings: &RunSettings,
) -> Result<(), NavtraderError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let DataSource::Sqlite { path, pool_size } = &settings.data_source else {
        return Err(NavtraderError::invalid(
            "backtest",
            "data_source",
            "import needs data_source = sqlite",
        ));
    };

    let store = SqliteAdapter::open(&resolve_path(config_path, path), *pool_size)?;
    store.initialize_schema()?;
    let histories = load_histories(
        &CsvAdapter::new(from.to_path_buf()),
        &settings.backtest.universe,
        settings.start_date,
        settings.end_date,
    )?;
    for (asset, bars) in &histories {
        let written = store.insert_bars(bars)?;
        if let Some((first, last, count)) = store.data_range(asset)? {
            println!("{asset}: {written} bars imported, {count} stored ({first} to {last})");
        }
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn run_import(_config_path: &Path, _from: &Path) -> ExitCode {
    eprintln!("error: sqlite feature is required for import");
    ExitCode::from(1)
}
