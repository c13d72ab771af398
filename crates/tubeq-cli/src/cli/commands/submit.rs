//! `tubeq submit <url>` – queue a video or a whole playlist.

use anyhow::Result;
use std::path::Path;
use tubeq_core::types::{FormatKind, Quality};
use tubeq_core::Submission;

use crate::cli::control_socket;
use crate::cli::protocol::Request;

pub async fn run_submit(
    socket: &Path,
    url: &str,
    quality: Quality,
    format_kind: FormatKind,
) -> Result<()> {
    let request = Request::Submit {
        url: url.to_string(),
        quality,
        format_kind,
    };
    let submission: Submission =
        serde_json::from_value(control_socket::call(socket, &request).await?)?;
    match submission {
        Submission::Single { job_id, title, .. } => {
            println!("Queued job {job_id}: {title}");
        }
        Submission::Group {
            group_id,
            job_ids,
            title,
            count,
            ..
        } => {
            println!("Queued playlist {group_id}: {title} ({count} item(s))");
            for (index, job_id) in job_ids.iter().enumerate() {
                println!("  {:>3}. {}", index + 1, job_id);
            }
        }
    }
    Ok(())
}
