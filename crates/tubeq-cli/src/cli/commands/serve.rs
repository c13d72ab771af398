//! `tubeq serve` – run the worker pool and the control socket until Ctrl-C.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tubeq_core::config::TubeqConfig;
use tubeq_core::fetcher::YtDlpFetcher;
use tubeq_core::JobManager;

use crate::cli::control_socket;

pub async fn run_serve(cfg: &TubeqConfig, socket_path: &Path) -> Result<()> {
    let fetcher = Arc::new(YtDlpFetcher::from_config(&cfg.ytdlp));
    let manager = Arc::new(
        JobManager::start(cfg, fetcher)
            .with_context(|| format!("prepare download dir {}", cfg.download_dir.display()))?,
    );

    let listener = control_socket::spawn_control_listener(Arc::clone(&manager), socket_path)?;
    tracing::info!(path = %socket_path.display(), "control socket listening");
    println!(
        "tubeq serving on {} ({} worker(s), downloads in {})",
        socket_path.display(),
        manager.pool_size(),
        manager.download_dir().display()
    );

    tokio::signal::ctrl_c()
        .await
        .context("wait for Ctrl-C")?;
    tracing::info!("interrupt received; shutting down");

    listener.abort();
    // Queued jobs ahead of the sentinels would otherwise still run.
    for job in manager.list_jobs() {
        if job.status.is_active() {
            if let Err(e) = manager.cancel_job(&job.id) {
                tracing::debug!(job_id = %job.id, "cancel on shutdown: {}", e);
            }
        }
    }
    manager.shutdown().await;
    if let Err(e) = std::fs::remove_file(socket_path) {
        tracing::debug!(path = %socket_path.display(), "remove control socket: {}", e);
    }
    Ok(())
}
