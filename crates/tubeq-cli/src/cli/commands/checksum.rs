//! `tubeq checksum <id>` – SHA-256 of a completed download.

use anyhow::Result;
use std::path::Path;
use tubeq_core::types::JobId;

use crate::cli::control_socket;
use crate::cli::protocol::Request;

pub async fn run_checksum(socket: &Path, job_id: JobId) -> Result<()> {
    let digest: String =
        serde_json::from_value(control_socket::call(socket, &Request::Checksum { job_id }).await?)?;
    println!("{digest}  {job_id}");
    Ok(())
}
