//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use crate::adapters::csv_adapter::{self, CsvAdapter};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::order_sink::{CsvOrderSink, JsonLinesOrderSink};
use crate::domain::allocator::{self, AllocationConfig, DEFAULT_POSITION_MAX_PCT, RebalancePlan};
use crate::domain::config_validation::{validate_portfolio_config, validate_screen_config};
use crate::domain::error::SiegfriedError;
use crate::domain::normalizer::{self, CanonicalField};
use crate::domain::portfolio::Portfolio;
use crate::domain::ratio::DEFAULT_TAX_RATE;
use crate::domain::retry::{MAX_RETRY_ATTEMPTS, MAX_RETRY_BACKOFF, RetryPolicy};
use crate::domain::screener::{
    DEFAULT_FAUSTMANN_THRESHOLD, DEFAULT_MAX_WORKERS, DEFAULT_ROIC_THRESHOLD, ScreenConfig,
    ScreenReport, Screener,
};
use crate::domain::statement::{Period, RawStatement, StatementKind};
use crate::domain::universe::{self, Universe, normalize_symbol, parse_symbols};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_port::MarketPort;
use crate::ports::order_port::OrderPort;
use crate::ports::report_port::ReportPort;
use crate::ports::statement_port::StatementPort;
use crate::ports::universe_port::UniversePort;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

pub const DEFAULT_STARTING_EQUITY: f64 = 100_000.0;

#[derive(Parser, Debug)]
#[command(
    name = "siegfried",
    about = "ROIC / Faustmann ratio equity screener and rebalancer"
)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Screen the universe and print ranked candidates
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated tickers replacing the configured universe
        #[arg(long)]
        tickers: Option<String>,
        /// Picks CSV output
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Screen, then compute equal-weight rebalance orders
    Rebalance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        tickers: Option<String>,
        /// Orders CSV output
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print orders as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Show raw statements, resolved fields and ratios for one ticker
    Inspect {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        ticker: String,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Builds the log filter from `RUST_LOG` (default `info`). `--verbose` raises
/// the default level to debug on top of whatever `RUST_LOG` says; per-target
/// directives from the environment still apply.
pub fn log_filter(verbose: bool, env: Option<&str>) -> EnvFilter {
    let filter = env
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    if verbose {
        filter.add_directive(LevelFilter::DEBUG.into())
    } else {
        filter
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Screen {
            config,
            tickers,
            output,
        } => run_screen(&config, tickers.as_deref(), output.as_deref()),
        Command::Rebalance {
            config,
            tickers,
            output,
            json,
        } => run_rebalance(&config, tickers.as_deref(), output.as_deref(), json),
        Command::Inspect { config, ticker } => run_inspect(&config, &ticker),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SiegfriedError> {
    tracing::info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Out-of-range values are clamped; `validate` reports them as errors.
pub fn build_retry_policy(config: &dyn ConfigPort) -> RetryPolicy {
    let defaults = RetryPolicy::default();
    let attempts = config
        .get_int("screen", "retry_attempts", i64::from(defaults.attempts))
        .clamp(1, i64::from(MAX_RETRY_ATTEMPTS));
    let backoff_ms = config
        .get_int("screen", "retry_backoff_ms", defaults.backoff.as_millis() as i64)
        .clamp(0, MAX_RETRY_BACKOFF.as_millis() as i64);
    RetryPolicy {
        attempts: attempts as u32,
        backoff: Duration::from_millis(backoff_ms as u64),
    }
}

pub fn build_screen_config(config: &dyn ConfigPort) -> Result<ScreenConfig, SiegfriedError> {
    let period = match config.get_string("screen", "period") {
        Some(value) => Period::from_str(&value)
            .map_err(|reason| SiegfriedError::invalid("screen", "period", reason))?,
        None => Period::Annual,
    };

    Ok(ScreenConfig {
        roic_threshold: config.get_double("screen", "roic_threshold", DEFAULT_ROIC_THRESHOLD),
        faustmann_threshold: config.get_double(
            "screen",
            "faustmann_threshold",
            DEFAULT_FAUSTMANN_THRESHOLD,
        ),
        tax_rate: config.get_double("screen", "tax_rate", DEFAULT_TAX_RATE),
        period,
        max_workers: config
            .get_int("screen", "max_workers", DEFAULT_MAX_WORKERS as i64)
            .max(1) as usize,
        retry: build_retry_policy(config),
    })
}

pub fn build_allocation_config(config: &dyn ConfigPort) -> AllocationConfig {
    AllocationConfig {
        position_max_pct: config.get_double(
            "portfolio",
            "position_max_pct",
            DEFAULT_POSITION_MAX_PCT,
        ),
        retry: build_retry_policy(config),
    }
}

/// Cash defaults to the starting equity; held positions come from the
/// optional `positions_file`.
pub fn build_portfolio(config: &dyn ConfigPort) -> Result<Portfolio, SiegfriedError> {
    let starting_equity =
        config.get_double("portfolio", "starting_equity", DEFAULT_STARTING_EQUITY);
    let cash = config
        .get_double_opt("portfolio", "cash")
        .unwrap_or(starting_equity);

    let positions = match config.get_string("portfolio", "positions_file") {
        Some(path) => {
            let positions = csv_adapter::load_positions(Path::new(&path))?;
            tracing::info!(path = %path, positions = positions.len(), "loaded positions");
            positions
        }
        None => Vec::new(),
    };

    Ok(Portfolio::new(cash)
        .with_positions(positions))
}

/// The configured statement, market and universe source.
pub enum DataSource {
    Csv(CsvAdapter),
    #[cfg(feature = "sqlite")]
    Sqlite(crate::adapters::sqlite_adapter::SqliteAdapter),
}

impl StatementPort for DataSource {
    fn fetch_statement(
        &self,
        ticker: &str,
        kind: StatementKind,
        period: Period,
    ) -> Result<RawStatement, SiegfriedError> {
        match self {
            DataSource::Csv(a) => a.fetch_statement(ticker, kind, period),
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => a.fetch_statement(ticker, kind, period),
        }
    }
}

impl MarketPort for DataSource {
    fn market_cap(&self, ticker: &str) -> Result<Option<f64>, SiegfriedError> {
        match self {
            DataSource::Csv(a) => a.market_cap(ticker),
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => a.market_cap(ticker),
        }
    }

    fn current_price(&self, ticker: &str) -> Result<f64, SiegfriedError> {
        match self {
            DataSource::Csv(a) => a.current_price(ticker),
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => a.current_price(ticker),
        }
    }
}

impl UniversePort for DataSource {
    fn list_universe(&self) -> Result<Vec<String>, SiegfriedError> {
        match self {
            DataSource::Csv(a) => a.list_universe(),
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => a.list_universe(),
        }
    }
}

pub fn build_data_source(config: &dyn ConfigPort) -> Result<DataSource, SiegfriedError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string())
        .to_lowercase();

    match source.as_str() {
        "csv" => {
            let path = config
                .get_string("data", "path")
                .ok_or_else(|| SiegfriedError::ConfigMissing {
                    section: "data".into(),
                    key: "path".into(),
                })?;
            let mut adapter = CsvAdapter::open(&path)?;
            if let Some(universe_file) = config.get_string("data", "universe_file") {
                adapter = adapter.with_universe_file(universe_file);
            }
            Ok(DataSource::Csv(adapter))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(DataSource::Sqlite(
            crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?,
        )),
        #[cfg(not(feature = "sqlite"))]
        "sqlite" => Err(SiegfriedError::invalid(
            "data",
            "source",
            "sqlite support not compiled in (enable the `sqlite` feature)",
        )),
        other => Err(SiegfriedError::invalid(
            "data",
            "source",
            format!("unknown data source '{other}' (expected csv or sqlite)"),
        )),
    }
}

/// `--tickers` replaces the source universe entirely.
pub fn resolve_universe(
    tickers: Option<&str>,
    source: &dyn UniversePort,
) -> Result<Universe, SiegfriedError> {
    match tickers {
        Some(list) => {
            let symbols = parse_symbols(list)
                .map_err(|e| SiegfriedError::invalid("cli", "tickers", e.to_string()))?;
            Ok(Universe::from_symbols(symbols))
        }
        None => universe::load_universe(source),
    }
}

fn screen_universe(
    config: &dyn ConfigPort,
    data: &DataSource,
    tickers: Option<&str>,
) -> Result<ScreenReport, SiegfriedError> {
    let screen_config = build_screen_config(config)?;
    let universe = resolve_universe(tickers, data)?;
    Screener::new(data, data, screen_config).run(&universe)
}

fn run_screen(
    config_path: &Path,
    tickers: Option<&str>,
    output: Option<&Path>,
) -> Result<(), SiegfriedError> {
    let config = load_config(config_path)?;
    validate_screen_config(&config)?;

    let data = build_data_source(&config)?;
    let report = screen_universe(&config, &data, tickers)?;

    print_report(&mut io::stdout().lock(), &report)?;

    let picks_path = output
        .map(|p| p.display().to_string())
        .or_else(|| config.get_string("report", "picks_path"));
    write_screen_files(&config, &report, picks_path)
}

/// Writes the picks and skip-list CSVs for whichever paths are configured.
fn write_screen_files(
    config: &dyn ConfigPort,
    report: &ScreenReport,
    picks_path: Option<String>,
) -> Result<(), SiegfriedError> {
    let reporter = CsvReportAdapter;
    if let Some(path) = picks_path {
        reporter.write_picks(report, &path)?;
    }
    if let Some(path) = config.get_string("report", "skipped_path") {
        reporter.write_skipped(report, &path)?;
        tracing::info!(path = %path, skipped = report.skipped.len(), "skip list written");
    }
    Ok(())
}

fn run_rebalance(
    config_path: &Path,
    tickers: Option<&str>,
    output: Option<&Path>,
    json: bool,
) -> Result<(), SiegfriedError> {
    let config = load_config(config_path)?;
    validate_screen_config(&config)?;
    validate_portfolio_config(&config)?;

    let portfolio = build_portfolio(&config)?;
    let allocation = build_allocation_config(&config);
    let data = build_data_source(&config)?;

    let report = screen_universe(&config, &data, tickers)?;
    let plan = allocator::plan_rebalance(&report.candidates, &portfolio, &data, &allocation)?;

    // stdout carries only order lines in JSON mode; the readable report moves to stderr.
    if json {
        print_plan(&mut io::stderr().lock(), &report, &plan)?;
        let mut sink = JsonLinesOrderSink::new(io::stdout().lock());
        sink.submit(&plan.orders)?;
    } else {
        print_plan(&mut io::stdout().lock(), &report, &plan)?;
    }

    let picks_path = config.get_string("report", "picks_path");
    write_screen_files(&config, &report, picks_path)?;

    let orders_path = output
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("report", "orders_path").map(PathBuf::from));
    if let Some(path) = orders_path {
        CsvOrderSink::new(&path).submit(&plan.orders)?;
    }
    Ok(())
}

fn run_inspect(config_path: &Path, ticker: &str) -> Result<(), SiegfriedError> {
    let config = load_config(config_path)?;
    validate_screen_config(&config)?;

    let screen_config = build_screen_config(&config)?;
    let data = build_data_source(&config)?;
    let ticker = normalize_symbol(ticker);
    let retry = &screen_config.retry;

    let mut statements = Vec::with_capacity(StatementKind::ALL.len());
    for kind in StatementKind::ALL {
        match retry.run(&ticker, || {
            data.fetch_statement(&ticker, kind, screen_config.period)
        }) {
            Ok(statement) => {
                print_statement(&statement);
                statements.push(statement);
            }
            // Cash flow is informational only.
            Err(e) if kind == StatementKind::CashFlow => {
                println!("== {} ({}) ==\n  unavailable: {}\n", kind, screen_config.period, e);
            }
            Err(e) => return Err(e),
        }
    }

    let (fundamentals, resolved) = normalizer::normalize_detailed(&statements[0], &statements[1])?;

    println!("== Canonical fields ==");
    for field in &resolved {
        println!(
            "  {:<22} {:<40} {}",
            field.field.name(),
            field.label,
            fmt_value(field.value)
        );
    }

    let market_cap = retry.run(&ticker, || data.market_cap(&ticker))?;
    println!("\n== Ratios ==");
    println!("  {:<22} {}", "market_cap", fmt_value(market_cap));
    println!("  {:<22} {}", "net_worth", fmt_value(fundamentals.net_worth()));
    println!(
        "  {:<22} {}",
        "roic",
        fmt_value(fundamentals.roic(screen_config.tax_rate))
    );
    println!(
        "  {:<22} {}",
        "faustmann_ratio",
        fmt_value(fundamentals.faustmann_ratio(market_cap))
    );

    let unresolved: Vec<_> = CanonicalField::ALL
        .iter()
        .filter(|f| fundamentals.get(**f).is_none())
        .map(|f| f.name())
        .collect();
    if !unresolved.is_empty() {
        println!("\n  absent values: {}", unresolved.join(", "));
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), SiegfriedError> {
    let config = load_config(config_path)?;
    validate_screen_config(&config)?;
    validate_portfolio_config(&config)?;
    build_screen_config(&config)?;
    println!("Configuration is valid");
    Ok(())
}

fn fmt_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.4}"),
        None => "n/a".to_string(),
    }
}

fn print_statement(statement: &RawStatement) {
    let period_end = statement
        .period_end
        .map(|d| d.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!(
        "== {} ({}, period ending {}) ==",
        statement.kind, statement.period, period_end
    );
    for (label, value) in &statement.entries {
        println!("  {:<40} {}", label, fmt_value(*value));
    }
    println!();
}

fn print_report(out: &mut impl Write, report: &ScreenReport) -> io::Result<()> {
    writeln!(
        out,
        "Screened {} tickers: {} candidates, {} rejected, {} skipped",
        report.universe_size,
        report.candidates.len(),
        report.rejected,
        report.skipped.len()
    )?;

    if !report.candidates.is_empty() {
        writeln!(out, "\n{:<4} {:<8} {:>10} {:>10}", "#", "TICKER", "ROIC", "FAUSTMANN")?;
        for (rank, c) in report.candidates.iter().enumerate() {
            writeln!(
                out,
                "{:<4} {:<8} {:>10.4} {:>10.4}",
                rank + 1,
                c.ticker,
                c.roic,
                c.faustmann
            )?;
        }
    }

    if !report.skipped.is_empty() {
        writeln!(out, "\nSkipped:")?;
        for s in &report.skipped {
            writeln!(out, "  {:<8} {}", s.ticker, s.reason)?;
        }
    }
    Ok(())
}

fn print_plan(
    out: &mut impl Write,
    report: &ScreenReport,
    plan: &RebalancePlan,
) -> io::Result<()> {
    print_report(out, report)?;

    writeln!(
        out,
        "\nTotal equity {:.2}, {:.1}% per position ({:.2})",
        plan.total_equity,
        plan.allocation_fraction * 100.0,
        plan.target_dollars
    )?;

    if plan.orders.is_empty() {
        writeln!(out, "No orders")?;
    } else {
        writeln!(out, "\nSuggested orders:")?;
        for order in &plan.orders {
            writeln!(out, "  {order}")?;
        }
    }

    if !plan.skipped.is_empty() {
        writeln!(out, "\nNot priced:")?;
        for s in &plan.skipped {
            writeln!(out, "  {:<8} {}", s.ticker, s.reason)?;
        }
    }
    Ok(())
}
