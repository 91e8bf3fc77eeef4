//! Standalone render daemon.
//!
//! Consumes the durable render queue and turns completed books into
//! PDF and DOCX documents. Generation itself happens in whatever
//! application embeds the `bookforge` library; this process only needs
//! the shared database and a directory to store rendered files in.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bookforge::config::default_config_path;
use bookforge::{load_config, BookforgeError, Database, EventBroadcaster, FileStorage, RenderWorker};

fn init_logging() {
    // Worker code logs through `log`, the pipeline through `tracing`;
    // the bridge funnels both into one subscriber.
    tracing_log::LogTracer::init().expect("logging already initialized");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("logging already initialized");
}

#[tokio::main]
async fn main() {
    // Initialize logging
    init_logging();

    info!("Starting bookforge-renderd v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run().await {
        error!("bookforge-renderd failed to start: {}", e);
        std::process::exit(1);
    }
}

/// Config path resolution order: CLI argument, `BOOKFORGE_CONFIG`,
/// then the per-user default.
fn config_path() -> PathBuf {
    if let Some(arg) = std::env::args().nth(1) {
        return PathBuf::from(arg);
    }
    if let Ok(path) = std::env::var("BOOKFORGE_CONFIG") {
        return PathBuf::from(path);
    }
    default_config_path()
}

async fn run() -> Result<(), BookforgeError> {
    let config_path = config_path();

    info!("Using config file: {}", config_path.display());
    let config = load_config(&config_path)?;

    let db = Database::open(&config.database_path)?;
    let storage = FileStorage::new(&config.storage_dir);
    let events = EventBroadcaster::new(config.event_capacity);

    let worker = RenderWorker::new(
        db,
        Arc::new(storage),
        events,
        Duration::from_secs(config.worker.min_spacing_secs),
        Duration::from_secs(config.worker.poll_interval_secs),
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let worker_flag = Arc::clone(&shutdown);
    let handle = tokio::spawn(async move { worker.run(worker_flag).await });

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Could not listen for shutdown signal: {}", e),
    }

    shutdown.store(true, Ordering::Relaxed);
    if let Err(e) = handle.await {
        warn!("Render worker task aborted: {}", e);
    }

    Ok(())
}
