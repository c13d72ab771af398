//! `tubeq cancel <id>` / `tubeq cancel-group <id>`.

use anyhow::Result;
use std::path::Path;
use tubeq_core::types::{GroupId, JobId};

use crate::cli::control_socket;
use crate::cli::protocol::Request;

pub async fn run_cancel(socket: &Path, job_id: JobId) -> Result<()> {
    control_socket::call(socket, &Request::Cancel { job_id }).await?;
    println!("Cancellation requested for job {job_id}");
    Ok(())
}

pub async fn run_cancel_group(socket: &Path, group_id: GroupId) -> Result<()> {
    let count: usize =
        serde_json::from_value(control_socket::call(socket, &Request::CancelGroup { group_id }).await?)?;
    println!("Cancellation requested for {count} job(s) in group {group_id}");
    Ok(())
}
