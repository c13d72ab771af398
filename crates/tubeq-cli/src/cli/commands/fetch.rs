//! `tubeq fetch <id> [--output DIR]` – copy a completed download out of the
//! download directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tubeq_core::types::JobId;

use crate::cli::control_socket;
use crate::cli::protocol::Request;

pub async fn run_fetch(socket: &Path, job_id: JobId, output: Option<&Path>) -> Result<()> {
    let source: PathBuf =
        serde_json::from_value(control_socket::call(socket, &Request::ArtifactPath { job_id }).await?)?;
    let file_name = source
        .file_name()
        .with_context(|| format!("artifact path has no file name: {}", source.display()))?;

    let out_dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };
    tokio::fs::create_dir_all(&out_dir)
        .await
        .with_context(|| format!("create {}", out_dir.display()))?;
    let dest = out_dir.join(file_name);
    let bytes = tokio::fs::copy(&source, &dest)
        .await
        .with_context(|| format!("copy {} to {}", source.display(), dest.display()))?;
    tracing::debug!(%job_id, bytes, dest = %dest.display(), "artifact copied");
    println!("Saved {} ({} bytes)", dest.display(), bytes);
    Ok(())
}
