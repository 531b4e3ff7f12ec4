//! remig-batch - Legacy archive migration runner
//!
//! Loads an inventory of archive and reference rows, runs the migration
//! pipeline over it and prints a run summary. Reference rows (sites and
//! channels) are folded into an immutable snapshot before any archive
//! item is processed.

use anyhow::{Context, Result};
use clap::Parser;
use remig_batch::{Pipeline, SourceRow};
use remig_common::MigrationConfig;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "remig-batch", about = "Legacy archive migration runner")]
struct Args {
    /// JSON inventory of archive, site and channel rows
    #[arg(long)]
    inventory: PathBuf,

    /// TOML run configuration; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tracking database URL
    #[arg(long, default_value = "sqlite::memory:")]
    database: String,

    /// Override the configured worker count
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    info!("Starting remig-batch");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => MigrationConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => MigrationConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.max_workers = workers;
    }

    let raw = std::fs::read_to_string(&args.inventory)
        .with_context(|| format!("failed to read inventory {}", args.inventory.display()))?;
    let rows: Vec<SourceRow> =
        serde_json::from_str(&raw).context("failed to parse inventory rows")?;
    info!(rows = rows.len(), "loaded inventory");

    // An in-memory database must stay on one connection; each pool
    // connection would otherwise open its own empty database.
    let max_connections = if args.database.contains(":memory:") {
        1
    } else {
        config.max_workers.max(1) as u32
    };
    let db = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&args.database)
        .await
        .with_context(|| format!("failed to open tracking database {}", args.database))?;

    let (pipeline, archives) = Pipeline::new(config, db, rows);

    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; finishing in-flight items");
            cancel.cancel();
        }
    });

    let summary = pipeline.run(archives).await?;

    info!(
        total = summary.total_archives,
        migrated = summary.migrated,
        failed = summary.failed,
        test = summary.test_items,
        notify = summary.notify_items,
        retried = summary.retried,
        "run summary"
    );

    let report = pipeline.report();
    for (category, count) in remig_batch::pipeline::failure_breakdown(&report) {
        info!(category = category, count, "failure category");
    }

    Ok(())
}
