//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::adjust::forward_adjust;
use crate::domain::backtest::{run_backtest, BacktestConfig, BacktestResult, DEFAULT_INITIAL_CAPITAL};
use crate::domain::config_validation::{validate_backtest_config, validate_provider_config};
use crate::domain::error::MacrossError;
use crate::domain::indicator::DEFAULT_MA_PERIOD;
use crate::domain::price::PricePoint;
use crate::domain::signal::CrossoverRule;
use crate::ports::config_port::{parse_config_date, ConfigPort};
use crate::ports::data_port::{LoadedSeries, PriceSeriesLoader};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "macross", about = "Moving-average crossover backtester")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over a CSV file or a stored code
    Backtest(BacktestArgs),
    /// Fetch daily rows in rate-limited chunks and store them in SQLite
    Import(ImportArgs),
    /// Show the stored date range for a code (or every code)
    Info {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        code: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct BacktestArgs {
    /// CSV price file
    #[arg(long, conflicts_with = "db")]
    pub data: Option<PathBuf>,
    /// SQLite database holding imported prices
    #[arg(long, requires = "code")]
    pub db: Option<PathBuf>,
    #[arg(long)]
    pub code: Option<String>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Initial cash
    #[arg(long)]
    pub capital: Option<f64>,
    /// Moving-average window in trading days
    #[arg(long)]
    pub window: Option<usize>,
    /// transition or difference
    #[arg(long)]
    pub rule: Option<CrossoverRule>,
    /// CSV of trade_date,adj_factor for forward adjustment
    #[arg(long)]
    pub factors: Option<PathBuf>,
    /// Adjustment anchor date (defaults to the last trading day)
    #[arg(long, requires = "factors")]
    pub base_date: Option<String>,
    /// Directory for equity_curve.csv, trades.csv and summary.csv
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Store the equity curve in SQLite under this run id
    #[arg(long)]
    pub save_run: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ImportArgs {
    /// Directory of per-code CSV exports acting as the upstream provider
    #[arg(long)]
    pub source_dir: PathBuf,
    #[arg(long)]
    pub code: String,
    #[arg(long)]
    pub start: String,
    #[arg(long)]
    pub end: String,
    #[arg(long)]
    pub db: PathBuf,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub chunk_days: Option<i64>,
    #[arg(long)]
    pub min_interval_ms: Option<u64>,
}

impl Cli {
    /// Installs a stderr subscriber whose level follows `-v` repetitions.
    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            warn!("tracing subscriber already installed");
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    cli.init_logging();

    let outcome = match cli.command {
        Command::Backtest(args) => run_backtest_command(&args).map(|_| ()),
        Command::Import(args) => run_import(&args).map(|_| ()),
        Command::Info { db, code } => run_info(&db, code.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, MacrossError> {
    match path {
        Some(p) => {
            eprintln!("Loading config from {}", p.display());
            FileConfigAdapter::from_file(p)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, MacrossError> {
    validate_backtest_config(adapter)?;

    let crossover_rule = match adapter.get_string("backtest", "crossover_rule") {
        Some(s) => s
            .parse::<CrossoverRule>()
            .map_err(|reason| MacrossError::config_invalid("backtest", "crossover_rule", reason))?,
        None => CrossoverRule::default(),
    };

    Ok(BacktestConfig {
        initial_capital: adapter.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL),
        ma_period: adapter.get_int("backtest", "ma_period", DEFAULT_MA_PERIOD as i64) as usize,
        crossover_rule,
    })
}

/// Config file values, then command-line overrides.
fn resolve_backtest_config(
    args: &BacktestArgs,
    config: &dyn ConfigPort,
) -> Result<BacktestConfig, MacrossError> {
    let mut bt_config = build_backtest_config(config)?;
    if let Some(capital) = args.capital {
        bt_config.initial_capital = capital;
    }
    if let Some(window) = args.window {
        bt_config.ma_period = window;
    }
    if let Some(rule) = args.rule {
        bt_config.crossover_rule = rule;
    }
    bt_config.validate()?;
    Ok(bt_config)
}

fn load_series(
    args: &BacktestArgs,
    config: &dyn ConfigPort,
) -> Result<(String, LoadedSeries), MacrossError> {
    if let Some(db) = &args.db {
        let code = args.code.clone().ok_or_else(|| MacrossError::ConfigMissing {
            section: "data".into(),
            key: "code".into(),
        })?;
        return load_from_db(&db.to_string_lossy(), &code).map(|s| (code, s));
    }

    let csv_path = args
        .data
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .or_else(|| config.get_string("data", "path"));

    match csv_path {
        Some(path) => {
            let series = CsvAdapter::new(PathBuf::new()).load(&path)?;
            Ok((path, series))
        }
        None => match (config.get_string("sqlite", "path"), &args.code) {
            (Some(db), Some(code)) => load_from_db(&db, code).map(|s| (code.clone(), s)),
            _ => Err(MacrossError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            }),
        },
    }
}

#[cfg(feature = "sqlite")]
fn load_from_db(db_path: &str, code: &str) -> Result<LoadedSeries, MacrossError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let store = SqliteAdapter::open(db_path, 1)?;
    store.initialize_schema()?;
    store.load(code)
}

#[cfg(not(feature = "sqlite"))]
fn load_from_db(_db_path: &str, _code: &str) -> Result<LoadedSeries, MacrossError> {
    Err(MacrossError::Database {
        reason: "sqlite feature is required for --db".into(),
    })
}

fn apply_adjustment(
    args: &BacktestArgs,
    config: &dyn ConfigPort,
    points: Vec<PricePoint>,
) -> Result<Vec<PricePoint>, MacrossError> {
    let Some(factors_path) = &args.factors else {
        return Ok(points);
    };

    let factors = CsvAdapter::new(PathBuf::new()).load_adj_factors(&factors_path.to_string_lossy())?;

    let base_date = match &args.base_date {
        Some(raw) => Some(parse_config_date(raw).ok_or_else(|| {
            MacrossError::config_invalid(
                "backtest",
                "base_date",
                format!("invalid date '{raw}' (expected YYYY-MM-DD or YYYYMMDD)"),
            )
        })?),
        None => config.get_date("backtest", "base_date")?,
    };
    let Some(base_date) = base_date.or_else(|| points.last().map(|p| p.date)) else {
        return Ok(points);
    };

    eprintln!("Forward-adjusting {} rows to {}", points.len(), base_date);
    forward_adjust(&points, &factors, base_date)
}

fn print_summary(source: &str, result: &BacktestResult) {
    let r = &result.report;
    eprintln!("\n=== Backtest Results: {} ===", source);
    if let (Some(start), Some(end)) = (r.start_date, r.end_date) {
        eprintln!("Period:           {} to {} ({:.2} years)", start, end, r.years_held);
    }
    eprintln!(
        "Window / Rule:    MA{} / {}",
        result.config.ma_period, result.config.crossover_rule
    );
    eprintln!("Initial Assets:   {:.2}", r.initial_assets);
    eprintln!("Final Assets:     {:.2}", r.final_assets);
    eprintln!("Total Return:     {:.2}%", r.total_return_pct);
    eprintln!("Annualized:       {:.2}%", r.annual_return_pct);
    eprintln!("Buy & Hold:       {:.2}%", r.buy_hold_return_pct);
    eprintln!(
        "Signals:          {} ({} buy, {} sell), {} executed",
        r.trade_signals, r.buy_signals, r.sell_signals, r.executed_trades
    );
    eprintln!("Max Drawdown:     -{:.2}%", r.risk.max_drawdown * 100.0);
    eprintln!("Drawdown Length:  {} days", r.risk.max_drawdown_duration_days);
    eprintln!("Sharpe Ratio:     {:.2}", r.risk.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", r.risk.sortino_ratio);
}

pub fn run_backtest_command(args: &BacktestArgs) -> Result<BacktestResult, MacrossError> {
    let config = load_config(args.config.as_deref())?;
    let bt_config = resolve_backtest_config(args, &config)?;

    let (source, series) = load_series(args, &config)?;
    if series.skipped_rows > 0 {
        eprintln!(
            "warning: skipped {} rows with unparseable dates",
            series.skipped_rows
        );
    }
    if series.points.is_empty() {
        return Err(MacrossError::NoData { code: source });
    }

    let points = apply_adjustment(args, &config, series.points)?;

    eprintln!(
        "Running backtest: {} days, MA{}, capital {:.2}",
        points.len(),
        bt_config.ma_period,
        bt_config.initial_capital
    );
    let result = run_backtest(&points, &bt_config)?;
    print_summary(&source, &result);

    let output_dir = args
        .output
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .or_else(|| config.get_string("report", "output_dir"));
    if let Some(dir) = output_dir {
        CsvReportAdapter.write(&result, &dir)?;
        eprintln!("\nReport written to: {}", dir);
    }

    if let Some(run_id) = &args.save_run {
        let db = args
            .db
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| config.get_string("sqlite", "path"))
            .ok_or_else(|| MacrossError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;
        save_run(&db, run_id, &result)?;
        eprintln!("Equity curve saved as run '{}'", run_id);
    }

    Ok(result)
}

#[cfg(feature = "sqlite")]
fn save_run(db_path: &str, run_id: &str, result: &BacktestResult) -> Result<(), MacrossError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let store = SqliteAdapter::open(db_path, 1)?;
    store.initialize_schema()?;
    store.save_equity_curve(run_id, &result.equity_curve)
}

#[cfg(not(feature = "sqlite"))]
fn save_run(_db_path: &str, _run_id: &str, _result: &BacktestResult) -> Result<(), MacrossError> {
    Err(MacrossError::Database {
        reason: "sqlite feature is required for --save-run".into(),
    })
}

fn parse_arg_date(key: &str, raw: &str) -> Result<chrono::NaiveDate, MacrossError> {
    parse_config_date(raw).ok_or_else(|| {
        MacrossError::config_invalid(
            "import",
            key,
            format!("invalid date '{raw}' (expected YYYY-MM-DD or YYYYMMDD)"),
        )
    })
}

/// Returns the number of rows stored.
#[cfg(feature = "sqlite")]
pub fn run_import(args: &ImportArgs) -> Result<usize, MacrossError> {
    use crate::adapters::rate_limiter::MinIntervalGate;
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    use crate::adapters::throttled_provider::ThrottledProvider;
    use crate::domain::date_range::DEFAULT_CHUNK_DAYS;
    use crate::domain::price::validate_series;

    let config = load_config(args.config.as_deref())?;
    validate_provider_config(&config)?;

    let start = parse_arg_date("start", &args.start)?;
    let end = parse_arg_date("end", &args.end)?;
    let chunk_days = args
        .chunk_days
        .unwrap_or_else(|| config.get_int("provider", "chunk_days", DEFAULT_CHUNK_DAYS));
    let interval_ms = match args.min_interval_ms {
        Some(ms) => ms,
        None => config.get_int("provider", "min_interval_ms", 0).max(0) as u64,
    };

    let provider = ThrottledProvider::new(
        CsvAdapter::new(args.source_dir.clone()),
        MinIntervalGate::from_millis(interval_ms),
        chunk_days,
    );

    eprintln!(
        "Importing {} from {} to {} ({}-day chunks, {} ms apart)",
        args.code, start, end, chunk_days, interval_ms
    );
    let outcome = provider.fetch_range(&args.code, start, end)?;
    if !outcome.failed_chunks.is_empty() {
        eprintln!(
            "warning: {} of {} chunks failed",
            outcome.failed_chunks.len(),
            outcome.chunks
        );
    }
    if outcome.points.is_empty() {
        return Err(MacrossError::NoData {
            code: args.code.clone(),
        });
    }
    validate_series(&outcome.points)?;

    let store = SqliteAdapter::open(&args.db.to_string_lossy(), 1)?;
    store.initialize_schema()?;
    let stored = store.insert_points(&args.code, &outcome.points)?;
    eprintln!("Imported {} rows into {}", stored, args.db.display());
    Ok(stored)
}

#[cfg(not(feature = "sqlite"))]
pub fn run_import(_args: &ImportArgs) -> Result<usize, MacrossError> {
    Err(MacrossError::Database {
        reason: "sqlite feature is required for import".into(),
    })
}

#[cfg(feature = "sqlite")]
fn run_info(db: &Path, code: Option<&str>) -> Result<(), MacrossError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let store = SqliteAdapter::open(&db.to_string_lossy(), 1)?;
    store.initialize_schema()?;

    let codes = match code {
        Some(c) => vec![c.to_string()],
        None => store.list_codes()?,
    };
    if codes.is_empty() {
        eprintln!("No data in {}", db.display());
    }

    for c in &codes {
        match store.get_data_range(c)? {
            Some((min_date, max_date, count)) => {
                println!("{}: {} rows, {} to {}", c, count, min_date, max_date);
            }
            None => eprintln!("{}: no data found", c),
        }
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn run_info(_db: &Path, _code: Option<&str>) -> Result<(), MacrossError> {
    Err(MacrossError::Database {
        reason: "sqlite feature is required for info".into(),
    })
}

fn run_validate(config_path: &Path) -> Result<(), MacrossError> {
    let config = load_config(Some(config_path))?;
    let bt_config = build_backtest_config(&config)?;
    validate_provider_config(&config)?;

    eprintln!("\nBacktest:");
    eprintln!("  initial_capital: {:.2}", bt_config.initial_capital);
    eprintln!("  ma_period:       {}", bt_config.ma_period);
    eprintln!("  crossover_rule:  {}", bt_config.crossover_rule);
    if let Some(path) = config.get_string("data", "path") {
        eprintln!("  data:            {}", path);
    }
    eprintln!("\nConfiguration is valid.");
    Ok(())
}
