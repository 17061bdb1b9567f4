//! `barsync`: bring the daily and intraday bar tables up to date with Finnhub.
//!
//! ```bash
//! export FINNHUB_API_KEY=...
//! barsync --db bars.db --symbols universe.txt            # both passes
//! barsync --db bars.db --symbols universe.txt --table daily_raw
//! RUST_LOG=debug,barsync=trace barsync --config barsync.json --symbols universe.txt
//! ```
//!
//! Exits with status 0 when every pass succeeded and 1 otherwise.

mod config;
mod universe;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use barsync::{Orchestrator, PassFailure, PassReport, RunStatus};
use barsync_core::{FileSkipListSink, Resolution, SkipList, SkipListSink, StorageBackend};
use barsync_finnhub::FinnhubSource;
use barsync_middleware::SourceBuilder;
use barsync_sqlite::SqliteStorage;

use crate::config::FileConfig;

const DEFAULT_DB: &str = "barsync.db";

/// Keep daily and intraday bar tables in sync with Finnhub.
#[derive(Debug, Parser)]
#[command(name = "barsync", version, about)]
struct Cli {
    /// JSON configuration file (sync, throttle and finnhub sections)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database holding the bar, split and skip-list tables
    #[arg(long, env = "BARSYNC_DB")]
    db: Option<PathBuf>,

    /// File listing the symbol universe, one symbol per line
    #[arg(long)]
    symbols: PathBuf,

    /// Run a single pass for this bar table (e.g. daily_raw)
    #[arg(long, conflicts_with = "both")]
    table: Option<String>,

    /// Run the daily and intraday passes concurrently (the default)
    #[arg(long)]
    both: bool,

    /// Keep the intraday skip-list in this text file instead of the database
    #[arg(long)]
    skip_list: Option<PathBuf>,

    /// Finnhub API token
    #[arg(long, env = "FINNHUB_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    match run(cli).await {
        Ok(RunStatus::Succeeded) => ExitCode::SUCCESS,
        Ok(status) => {
            tracing::warn!(?status, "run finished with failures");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("barsync failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<RunStatus> {
    let mut file = FileConfig::load(cli.config.as_deref())?;
    if let Some(key) = cli.api_key {
        file.finnhub.api_key = key;
    }
    let db_path = cli
        .db
        .or(file.db)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));
    let skip_path = cli.skip_list.or(file.skip_list);
    let symbols = universe::load(&cli.symbols)?;

    let storage = Arc::new(
        SqliteStorage::open(&db_path, &file.sync)
            .with_context(|| format!("opening database {}", db_path.display()))?,
    );
    let sink: Arc<dyn SkipListSink> = match skip_path {
        Some(path) => Arc::new(FileSkipListSink::new(path)),
        None => Arc::new(storage.skip_list_sink()),
    };
    let skip_list = SkipList::load(sink)
        .await
        .context("loading intraday skip-list")?;

    let raw = Arc::new(FinnhubSource::new(&file.finnhub).context("configuring Finnhub")?);
    let source = SourceBuilder::new(raw)
        .with_throttle(file.throttle.clone())
        .build();

    let orchestrator = Orchestrator::builder()
        .source(source)
        .storage(storage as Arc<dyn StorageBackend>)
        .skip_list(Arc::new(skip_list))
        .config(file.sync)
        .build()?;

    tracing::info!(
        db = %db_path.display(),
        symbols = symbols.len(),
        skip_listed = orchestrator.engine().skip_list().len(),
        "starting run"
    );

    let status = match cli.table {
        Some(table) => {
            let result = orchestrator.run_table(&table, &symbols).await;
            summarize(&table, &result);
            if result.is_ok() {
                RunStatus::Succeeded
            } else {
                RunStatus::Failed
            }
        }
        None => {
            let report = orchestrator.run_both(symbols).await;
            let cfg = orchestrator.config();
            summarize(cfg.table(Resolution::Daily), &report.daily);
            summarize(cfg.table(Resolution::Intraday), &report.intraday);
            report.status()
        }
    };
    Ok(status)
}

fn summarize(table: &str, result: &Result<PassReport, PassFailure>) {
    match result {
        Ok(report) => tracing::info!(
            table,
            symbols = report.symbols.len(),
            rows_written = report.rows_written(),
            appended = report.count("appended"),
            reloaded = report.count("reloaded"),
            up_to_date = report.count("up_to_date"),
            nothing_new = report.count("nothing_new"),
            skipped = report.count("skipped"),
            no_history = report.count("no_history"),
            anomalies = report.count("anomaly"),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "pass complete"
        ),
        Err(failure) => tracing::error!(
            table,
            completed = failure.completed,
            symbol = ?failure.symbol,
            "{}",
            failure.alert_message()
        ),
    }
}
