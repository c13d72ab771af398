//! `tubeq delete`, `tubeq delete-group`, `tubeq clear`.

use anyhow::Result;
use std::path::Path;
use tubeq_core::types::{GroupId, JobId};
use tubeq_core::ClearedCounts;

use crate::cli::control_socket;
use crate::cli::protocol::Request;

pub async fn run_delete(socket: &Path, job_id: JobId) -> Result<()> {
    control_socket::call(socket, &Request::Delete { job_id }).await?;
    println!("Deleted job {job_id}");
    Ok(())
}

pub async fn run_delete_group(socket: &Path, group_id: GroupId) -> Result<()> {
    let deleted: usize =
        serde_json::from_value(control_socket::call(socket, &Request::DeleteGroup { group_id }).await?)?;
    println!("Deleted group {group_id} ({deleted} finished job(s) removed)");
    Ok(())
}

pub async fn run_clear(socket: &Path) -> Result<()> {
    let cleared: ClearedCounts =
        serde_json::from_value(control_socket::call(socket, &Request::Clear).await?)?;
    println!(
        "Cleared {} job(s) and {} group(s)",
        cleared.jobs, cleared.groups
    );
    Ok(())
}
