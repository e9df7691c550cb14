//! tdxsync CLI: incremental market data sync into DuckDB.
//!
//! Commands:
//! - `cron`: run one full sync cycle
//! - `init`: bootstrap the daily table from a local vendor directory
//! - `factors`: recompute adjustment factors on demand
//! - `views`: re-establish every served view
//! - `plan`: print the candidate dates a sync would try
//! - `stage`: replace a minute stream's staging table from a CSV file
//! - `archive`: move old minute rows into the Parquet archive

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tdxsync_core::data::{HttpDownloader, NoopTranscoder, TdxDecoder, ToolTranscoder, Transcoder};
use tdxsync_core::planner::plan;
use tdxsync_core::{MinuteStream, Symbol, SyncConfig};
use tdxsync_runner::{
    establish_views, init_from_directory, recompute_factors, run_cycle, stage, Collaborators,
    DuckStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tdxsync", about = "tdxsync: TDX market data sync into DuckDB")]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Working directory override (also settable via DATA_PATH).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log filter, e.g. `info` or `tdxsync_runner=debug`. RUST_LOG wins when set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one full sync cycle.
    Cron {
        /// DuckDB database file.
        #[arg(long)]
        db: PathBuf,

        /// Minute streams to sync, e.g. `1,5`. Overrides the config file.
        #[arg(long, value_delimiter = ',')]
        minline: Option<Vec<MinuteStream>>,

        /// Print the cycle report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Bootstrap the daily table from a directory of vendor day files.
    Init {
        #[arg(long)]
        db: PathBuf,

        /// Directory holding full-history `.day` files.
        #[arg(long)]
        day_dir: PathBuf,
    },
    /// Recompute adjustment factors.
    Factors {
        #[arg(long)]
        db: PathBuf,

        /// Only these symbols (comma separated). All stored symbols by default.
        #[arg(long, value_delimiter = ',')]
        symbols: Option<Vec<Symbol>>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Re-establish every served view.
    Views {
        #[arg(long)]
        db: PathBuf,

        /// Minute streams whose views to build.
        #[arg(long, value_delimiter = ',')]
        minline: Option<Vec<MinuteStream>>,
    },
    /// Print the candidate dates after a last-synced date.
    Plan {
        /// Last synced date (YYYY-MM-DD).
        #[arg(long)]
        from: NaiveDate,

        /// Defaults to today.
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Replace a minute stream's staging table from a CSV file.
    Stage {
        #[arg(long)]
        db: PathBuf,

        /// `1min` or `5min`.
        #[arg(long)]
        stream: MinuteStream,

        /// CSV artifact in the stream's column layout.
        csv: PathBuf,
    },
    /// Move minute rows before a date into the Parquet archive.
    Archive {
        #[arg(long)]
        db: PathBuf,

        #[arg(long)]
        stream: MinuteStream,

        /// Rows strictly before this date are archived.
        #[arg(long)]
        before: NaiveDate,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let base = load_config(cli.config.as_deref(), cli.data_dir)?;
    match cli.command {
        Commands::Cron { db, minline, json } => run_cron(with_db(base, db, minline), json),
        Commands::Init { db, day_dir } => run_init(with_db(base, db, None), &day_dir),
        Commands::Factors { db, symbols, json } => {
            run_factors(with_db(base, db, None), symbols, json)
        }
        Commands::Views { db, minline } => run_views(with_db(base, db, minline)),
        Commands::Plan { from, to } => run_plan(&base, from, to),
        Commands::Stage { db, stream, csv } => run_stage(with_db(base, db, None), stream, &csv),
        Commands::Archive { db, stream, before } => {
            run_archive(with_db(base, db, None), stream, before)
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<SyncConfig> {
    let mut config = match path {
        Some(path) => SyncConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SyncConfig::default(),
    }
    .with_env_overrides();
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

fn with_db(mut config: SyncConfig, db: PathBuf, minline: Option<Vec<MinuteStream>>) -> SyncConfig {
    config.database = Some(db);
    if let Some(mut streams) = minline {
        streams.sort();
        streams.dedup();
        config.minute_streams = streams;
    }
    config
}

/// Adds `stream` to the served streams so its views pick up a fresh archive.
fn serving_stream(mut config: SyncConfig, stream: MinuteStream) -> SyncConfig {
    if !config.minute_streams.contains(&stream) {
        info!(%stream, "stream not configured, serving it from now on");
        config.minute_streams.push(stream);
        config.minute_streams.sort();
    }
    config
}

fn open_store(config: &SyncConfig) -> Result<DuckStore> {
    config.validate()?;
    let path = config.database_path()?;
    let store = DuckStore::open(path, config.store_connections)
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(store)
}

fn run_cron(config: SyncConfig, json: bool) -> Result<()> {
    let store = open_store(&config)?;
    let downloader = HttpDownloader::new(Duration::from_secs(config.sources.timeout_secs))?;
    let decoder = TdxDecoder;
    let transcoder: Box<dyn Transcoder> = match &config.transcoder {
        Some(program) => Box::new(ToolTranscoder::new(program)),
        None => {
            info!("no transcoder configured, expecting vendor files in place");
            Box::new(NoopTranscoder)
        }
    };
    let collaborators = Collaborators {
        downloader: &downloader,
        decoder: &decoder,
        transcoder: transcoder.as_ref(),
    };

    let report = run_cycle(&config, &store, &collaborators)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn run_init(config: SyncConfig, day_dir: &Path) -> Result<()> {
    if !day_dir.is_dir() {
        bail!("day directory does not exist: {}", day_dir.display());
    }
    let store = open_store(&config)?;
    let rows = init_from_directory(&config, &store, &TdxDecoder, day_dir)?;
    println!("Imported {rows} daily rows from {}", day_dir.display());
    Ok(())
}

fn run_factors(config: SyncConfig, symbols: Option<Vec<Symbol>>, json: bool) -> Result<()> {
    let store = open_store(&config)?;
    let summary = recompute_factors(&config, &store, symbols.as_deref())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!(
        "Factors: {} symbols, {} computed, {} rows imported",
        summary.symbols, summary.computed, summary.imported
    );
    for fault in &summary.faults {
        println!("  skipped {}: {}", fault.symbol, fault.reason);
    }
    Ok(())
}

fn run_views(config: SyncConfig) -> Result<()> {
    let store = open_store(&config)?;
    for name in establish_views(&store, &config)? {
        println!("{name}");
    }
    Ok(())
}

fn run_plan(config: &SyncConfig, from: NaiveDate, to: Option<NaiveDate>) -> Result<()> {
    let to = to.unwrap_or_else(|| config.today());
    let dates = plan(from, to);
    if dates.is_empty() {
        println!("Up to date ({from} >= {to})");
    }
    for date in dates {
        println!("{date}");
    }
    Ok(())
}

fn run_stage(config: SyncConfig, stream: MinuteStream, csv: &Path) -> Result<()> {
    if !csv.is_file() {
        bail!("staging file does not exist: {}", csv.display());
    }
    let store = open_store(&config)?;
    let rows = stage(&store, stream, csv)?;
    println!("Staged {rows} rows into {stream}");
    Ok(())
}

fn run_archive(config: SyncConfig, stream: MinuteStream, before: NaiveDate) -> Result<()> {
    let config = serving_stream(config, stream);
    let store = open_store(&config)?;
    let rows = store.export_archive(stream, before, &config.archive_dir(stream))?;
    establish_views(&store, &config)?;
    println!(
        "Archived {rows} {stream} rows before {before} into {}",
        config.archive_dir(stream).display()
    );
    Ok(())
}
