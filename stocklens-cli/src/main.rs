//! StockLens CLI: migrate, ingest, and query commands.
//!
//! Commands:
//! - `migrate`: apply pending schema migrations
//! - `ingest`: load every ticker in the universe that is not yet stored
//! - `companies`, `recent`, `summary`, `compare`: JSON query output
//! - `status`: per-symbol record counts and date ranges

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stocklens_core::data::{CircuitBreaker, CsvSource, RawBarSource, Universe, YahooSource};
use stocklens_core::pipeline::LogProgress;
use stocklens_core::{
    AnalyticsService, IngestSummary, IngestionPipeline, LensConfig, QueryError, SeriesStore,
    TickerOutcome,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code for queries that matched no data.
const EXIT_NOT_FOUND: i32 = 2;

#[derive(Parser)]
#[command(
    name = "stocklens",
    about = "StockLens CLI: daily equity ingestion and analytics"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file. Overrides the config file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    Yahoo,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations.
    Migrate,
    /// Ingest every ticker in the universe that is not already stored.
    Ingest {
        /// Where raw bars come from.
        #[arg(long, value_enum, default_value_t = SourceKind::Yahoo)]
        source: SourceKind,

        /// Directory of `{SYMBOL}.csv` files (required with --source csv).
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Universe TOML file. Overrides the config file.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Years of history to request. Overrides the config file.
        #[arg(long)]
        years: Option<u32>,

        /// Process tickers concurrently.
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },
    /// List stored companies.
    Companies,
    /// Most recent rows for a symbol.
    Recent {
        symbol: String,

        /// Rows to return. Defaults to the configured recent window.
        #[arg(long)]
        days: Option<usize>,
    },
    /// 52-week high, low, and average close.
    Summary { symbol: String },
    /// Closing prices of two symbols over a trailing window.
    Compare {
        a: String,
        b: String,

        /// Calendar days to cover. Defaults to the configured compare window.
        #[arg(long)]
        days: Option<u32>,
    },
    /// Per-symbol record counts and date ranges.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.db)?;
    init_tracing(&config.log_filter);

    let result = match cli.command {
        Commands::Migrate => run_migrate(&config),
        Commands::Ingest {
            source,
            csv_dir,
            universe,
            years,
            parallel,
        } => run_ingest(config, source, csv_dir, universe, years, parallel),
        Commands::Companies => run_companies(&config),
        Commands::Recent { symbol, days } => run_recent(&config, &symbol, days),
        Commands::Summary { symbol } => run_summary(&config, &symbol),
        Commands::Compare { a, b, days } => run_compare(&config, &a, &b, days),
        Commands::Status => run_status(&config),
    };

    if let Err(err) = &result {
        if let Some(QueryError::NotFound(message)) = err.downcast_ref::<QueryError>() {
            eprintln!("Not found: {message}");
            std::process::exit(EXIT_NOT_FOUND);
        }
    }
    result
}

fn load_config(path: Option<&Path>, db: Option<PathBuf>) -> Result<LensConfig> {
    let mut config = match path {
        Some(path) => LensConfig::from_file(path)?,
        None => LensConfig::default(),
    };
    if let Some(db) = db {
        config.database_path = db;
    }
    Ok(config)
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_store(config: &LensConfig) -> Result<SeriesStore> {
    SeriesStore::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_migrate(config: &LensConfig) -> Result<()> {
    let store = open_store(config)?;
    let applied = store.migrate()?;
    println!(
        "Applied {applied} migration(s) to {}",
        config.database_path.display()
    );
    Ok(())
}

fn run_ingest(
    mut config: LensConfig,
    source_kind: SourceKind,
    csv_dir: Option<PathBuf>,
    universe_path: Option<PathBuf>,
    years: Option<u32>,
    parallel: bool,
) -> Result<()> {
    if let Some(path) = universe_path {
        config.universe = Universe::from_file(&path).map_err(anyhow::Error::msg)?;
    }
    if let Some(years) = years {
        config.history_years = years;
    }
    config.validate()?;

    let mut breaker = None;
    let source: Box<dyn RawBarSource> = match source_kind {
        SourceKind::Yahoo => {
            let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
            breaker = Some(Arc::clone(&circuit_breaker));
            Box::new(YahooSource::new(circuit_breaker)?)
        }
        SourceKind::Csv => {
            let Some(dir) = csv_dir else {
                bail!("--csv-dir is required with --source csv");
            };
            Box::new(CsvSource::open(dir)?)
        }
    };

    let store = open_store(&config)?;
    store.migrate()?;

    let symbols = config.universe.symbols();
    let span = config.history_span(chrono::Local::now().date_naive());
    tracing::info!(
        universe = %config.universe.name,
        tickers = symbols.len(),
        source = source.name(),
        from = %span.start,
        to = %span.end,
        "starting ingestion"
    );

    let pipeline = IngestionPipeline::new(source.as_ref(), &store, span);
    let summary = if parallel {
        pipeline.run_parallel(&symbols, &LogProgress)?
    } else {
        pipeline.run(&symbols, &LogProgress)?
    };

    print_ingest_summary(&summary);
    if let Some(cooldown) = breaker
        .map(|cb| cb.remaining_cooldown())
        .filter(|wait| !wait.is_zero())
    {
        println!(
            "Source blocked; retry in {}s to load the skipped tickers",
            cooldown.as_secs().max(1)
        );
    }
    Ok(())
}

fn print_ingest_summary(summary: &IngestSummary) {
    for ticker in &summary.tickers {
        let marker = match ticker.outcome {
            TickerOutcome::Loaded { .. } => "OK  ",
            TickerOutcome::Skipped(_) => "SKIP",
        };
        println!("  {marker} {:<16} {}", ticker.symbol.as_str(), ticker.outcome);
    }
    println!(
        "Loaded {} of {} tickers ({} rows), skipped {}",
        summary.loaded(),
        summary.total(),
        summary.rows_written(),
        summary.skipped()
    );
}

fn analytics(config: &LensConfig) -> Result<AnalyticsService> {
    let store = open_store(config)?;
    Ok(AnalyticsService::with_windows(store, config.query_windows()))
}

fn run_companies(config: &LensConfig) -> Result<()> {
    let companies = analytics(config)?.list_companies()?;
    print_json(&serde_json::to_value(companies)?)
}

fn run_recent(config: &LensConfig, symbol: &str, days: Option<usize>) -> Result<()> {
    let service = analytics(config)?;
    let rows = days.unwrap_or(service.windows().recent_rows);
    let records = service.recent_rows(symbol, rows)?;
    print_json(&serde_json::to_value(records)?)
}

fn run_summary(config: &LensConfig, symbol: &str) -> Result<()> {
    let summary = analytics(config)?.summary(symbol)?;
    print_json(&serde_json::to_value(summary)?)
}

fn run_compare(config: &LensConfig, a: &str, b: &str, days: Option<u32>) -> Result<()> {
    let service = analytics(config)?;
    let window = days.unwrap_or(service.windows().compare_days);
    let today = chrono::Local::now().date_naive();
    let comparison = service.compare_as_of(a, b, window, today)?;
    print_json(&serde_json::to_value(comparison)?)
}

fn run_status(config: &LensConfig) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.series_stats()?;
    if stats.is_empty() {
        println!("No companies stored in {}", config.database_path.display());
        return Ok(());
    }

    println!("Database: {}", config.database_path.display());
    println!("Symbols:  {}", stats.len());
    println!();
    println!(
        "{:<16} {:>8}  {:<10}  {:<10}  Name",
        "Symbol", "Records", "First", "Last"
    );
    for s in &stats {
        let first = s.first_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
        let last = s.last_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:<16} {:>8}  {:<10}  {:<10}  {}",
            s.symbol.as_str(),
            s.records,
            first,
            last,
            s.name
        );
    }
    Ok(())
}
