//! Start the scan station.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use scandesk_coordinator::Coordinator;
use scandesk_core::config::AssignmentMode;
use scandesk_hardware::devices::DeviceProvider;
use scandesk_hardware::line::LineTagSource;
use scandesk_hardware::ScannerPool;
use scandesk_storage::{SqliteSessionStore, SqliteTagDirectory};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::console::{ConsoleSink, OutputFormat};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Override the configured assignment mode
    #[arg(long)]
    pub mode: Option<AssignmentMode>,

    /// Read badge tags from standard input when no RFID device is configured
    #[arg(long)]
    pub stdin_tags: bool,
}

pub async fn execute(
    args: &RunArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(mode) = args.mode {
        config.assignment.mode = mode;
    }

    let db = super::open_database(&config).await?;
    let store = SqliteSessionStore::new(db.pool().clone());
    let directory = SqliteTagDirectory::new(db.pool().clone());

    let (pool_tx, pool_rx) = mpsc::channel(config.channel_capacity);
    let provider = DeviceProvider::new(config.scanners.sources.clone())
        .context("invalid scanner configuration")?;
    let pool = Arc::new(ScannerPool::new(provider, &config.scanners, pool_tx));

    let (coordinator, handle) = Coordinator::builder(&config, store, directory)
        .sink(Arc::new(ConsoleSink::new(format)))
        .workers(pool.clone())
        .build(pool_rx);
    let coordinator_task = tokio::spawn(coordinator.run());

    pool.start_all().context("failed to start scanners")?;

    let reader = match (&config.rfid.device, args.stdin_tags) {
        (Some(device), _) => Some(
            LineTagSource::open(device)
                .await
                .with_context(|| format!("failed to open RFID reader {}", device.display()))?,
        ),
        (None, true) => Some(LineTagSource::stdin()),
        (None, false) => {
            warn!("no RFID reader configured, nobody can log in");
            None
        }
    };
    let reader_task = reader.map(|reader| handle.attach_tag_source(reader));

    info!(
        mode = %config.assignment.mode,
        scanners = config.scanners.sources.len(),
        database = %config.persistence.database_path,
        "scan station running, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutting down");

    if let Some(task) = reader_task {
        task.abort();
    }
    pool.shutdown().await;
    handle.shutdown().await;
    coordinator_task
        .await
        .context("coordinator task failed")?;

    let stats = handle.stats();
    info!(
        accepted = stats.scans_accepted,
        discarded = stats.scans_discarded,
        duplicates = stats.duplicates_rejected,
        open_sessions = stats.active_sessions,
        failed_writes = stats.failed_writes,
        "scan station stopped"
    );
    db.close().await;
    Ok(())
}
