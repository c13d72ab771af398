//! `tubeq clean-storage` – delete every file in the download directory.

use anyhow::Result;
use std::path::Path;

use crate::cli::control_socket;
use crate::cli::protocol::Request;

pub async fn run_clean_storage(socket: &Path) -> Result<()> {
    let removed: usize =
        serde_json::from_value(control_socket::call(socket, &Request::CleanStorage).await?)?;
    println!("Deleted {removed} file(s)");
    Ok(())
}
