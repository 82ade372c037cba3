//! CLI entry point for the playstats snapshot tracker.
//!
//! Provides subcommands for recording a ranking snapshot, summarizing the
//! latest stored snapshot, and listing the current ranking without
//! persisting anything.

mod infra;
mod services;

use crate::infra::steam::client::SteamClient;
use crate::services::charts_api::ChartsApi;
use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use playstats::analyzers::summary::SnapshotSummary;
use playstats::config::IngestConfig;
use playstats::delta::compute_deltas;
use playstats::ingest::ingest;
use playstats::model::DetailRecord;
use playstats::store;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "playstats")]
#[command(about = "Track and summarize the most played Steam games", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one ranking snapshot: fetch, ingest, compute deltas, append
    Snapshot {
        /// CSV store to append the snapshot to
        #[arg(short, long, default_value = "steam_data.csv")]
        output: String,

        /// Optional backup CSV store merged in when deriving previous ranks
        #[arg(short, long)]
        backup: Option<String>,

        /// How many top-ranked games to request
        #[arg(short = 'n', long, default_value_t = 25)]
        top_n: usize,

        /// JSON file holding an array of game names to exclude
        #[arg(short, long)]
        exclude_file: Option<String>,
    },
    /// Summarize the latest stored snapshot as JSON
    Summary {
        /// Primary CSV store
        #[arg(short, long, default_value = "steam_data.csv")]
        output: String,

        /// Optional backup CSV store merged before summarizing
        #[arg(short, long)]
        backup: Option<String>,

        /// How many top ranks the mean price covers
        #[arg(short = 'k', long, default_value_t = 10)]
        top_k: usize,
    },
    /// Fetch and log the current ranking without persisting
    ListTop {
        /// How many top-ranked games to request
        #[arg(short = 'n', long, default_value_t = 25)]
        top_n: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/playstats.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("playstats.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Snapshot {
            output,
            backup,
            top_n,
            exclude_file,
        } => {
            record_snapshot(&output, backup.as_deref(), top_n, exclude_file.as_deref()).await?;
        }
        Commands::Summary {
            output,
            backup,
            top_k,
        } => {
            summarize(&output, backup.as_deref(), top_k)?;
        }
        Commands::ListTop { top_n } => {
            list_top(top_n).await?;
        }
    }

    Ok(())
}

/// One full snapshot run: ranking fetch, per-app detail fetches, ingestion,
/// delta computation against the merged store, append.
///
/// A ranking fetch failure aborts before anything is written; per-app detail
/// failures only shrink the batch.
#[tracing::instrument(skip(backup, exclude_file), fields(output, top_n))]
async fn record_snapshot(
    output: &str,
    backup: Option<&str>,
    top_n: usize,
    exclude_file: Option<&str>,
) -> Result<()> {
    let config = match exclude_file {
        Some(path) => IngestConfig {
            top_n,
            ..IngestConfig::with_exclusions_from(path)?
        },
        None => IngestConfig {
            top_n,
            ..IngestConfig::default()
        },
    };

    let client = SteamClient::new();
    let snapshot_time = Utc::now();

    let entries = client.top_games(config.top_n).await?;
    info!(count = entries.len(), "Ranking fetched");

    let mut details: HashMap<u32, DetailRecord> = HashMap::new();
    for entry in &entries {
        match client.app_details(entry.app_id).await {
            Ok(detail) => {
                details.insert(entry.app_id, detail);
            }
            Err(e) => {
                warn!(app_id = entry.app_id, error = %e, "Store detail fetch failed");
            }
        }
    }

    let report = ingest(
        &entries,
        |id| details.get(&id).cloned(),
        snapshot_time,
        &config,
    );
    for skip in &report.skipped {
        debug!(app_id = skip.app_id, reason = ?skip.reason, "Entry skipped");
    }

    let stored = store::merge_stores(output, backup)?;
    let previous = store::previous_ranks(&stored, snapshot_time);
    let enriched = compute_deltas(report.observations, &previous);

    for obs in &enriched {
        info!(
            name = %obs.name,
            rank = obs.rank,
            status = %obs.status,
            delta = obs.delta,
            peak = obs.peak_in_game,
            "Game recorded"
        );
    }

    store::append_snapshot(output, &enriched)?;
    info!(
        kept = enriched.len(),
        skipped = report.skipped.len(),
        output,
        "Snapshot run complete"
    );

    Ok(())
}

/// Summarizes the latest snapshot in the merged store(s) and logs it as JSON.
#[tracing::instrument(skip(backup), fields(output, top_k))]
fn summarize(output: &str, backup: Option<&str>, top_k: usize) -> Result<()> {
    let stored = store::merge_stores(output, backup)?;
    let latest = store::latest_snapshot(&stored);

    if latest.is_empty() {
        info!(output, "Store is empty, nothing to summarize");
        return Ok(());
    }

    let summary = SnapshotSummary::from_snapshot(&latest, top_k);
    info!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Fetches the current ranking and logs it without touching the store.
#[tracing::instrument]
async fn list_top(top_n: usize) -> Result<()> {
    let client = SteamClient::new();
    let entries = client.top_games(top_n).await?;

    for entry in &entries {
        info!(
            app_id = entry.app_id,
            rank = entry.rank,
            peak = entry.peak_in_game,
            "Rank entry"
        );
    }

    info!(total = entries.len(), "Ranking fetched");
    Ok(())
}
