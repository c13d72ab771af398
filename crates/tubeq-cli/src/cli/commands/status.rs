//! `tubeq status [id]` and `tubeq group <id>`.

use anyhow::Result;
use std::path::Path;
use tubeq_core::types::{GroupId, GroupStatus, JobId, JobRecord};

use crate::cli::control_socket;
use crate::cli::protocol::Request;

fn rate_str(bytes_per_sec: f64) -> String {
    if bytes_per_sec <= 0.0 {
        "-".to_string()
    } else {
        format!("{:.2} MiB/s", bytes_per_sec / 1_048_576.0)
    }
}

fn print_job(job: &JobRecord) {
    println!("Job:      {}", job.id);
    println!("Title:    {}", job.title);
    println!("URL:      {}", job.source_url);
    println!("Status:   {} ({})", job.status, job.message);
    println!("Progress: {}%  {}", job.progress, rate_str(job.transfer_rate));
    println!("Format:   {} / {}", job.format_kind, job.quality);
    if let Some(ref slot) = job.playlist {
        println!(
            "Playlist: {} [{}/{}] {}",
            slot.group_title, slot.index, slot.count, slot.group_id
        );
    }
    if let Some(ref file) = job.output_file {
        println!("File:     {file}");
    }
}

pub async fn run_status(socket: &Path, job_id: Option<JobId>) -> Result<()> {
    if let Some(job_id) = job_id {
        let job: JobRecord =
            serde_json::from_value(control_socket::call(socket, &Request::Status { job_id }).await?)?;
        print_job(&job);
        return Ok(());
    }

    let jobs: Vec<JobRecord> =
        serde_json::from_value(control_socket::call(socket, &Request::List).await?)?;
    if jobs.is_empty() {
        println!("No jobs.");
    } else {
        println!(
            "{:<36} {:<12} {:>4}  {:<20} {}",
            "ID", "STATUS", "PCT", "MESSAGE", "TITLE"
        );
        for j in jobs {
            println!(
                "{:<36} {:<12} {:>3}%  {:<20} {}",
                j.id,
                j.status.as_str(),
                j.progress,
                j.message,
                j.title
            );
        }
    }
    Ok(())
}

pub async fn run_group(socket: &Path, group_id: GroupId) -> Result<()> {
    let group: GroupStatus =
        serde_json::from_value(control_socket::call(socket, &Request::Group { group_id }).await?)?;
    let s = group.statuses;
    println!("Group:   {}", group.id);
    println!("Title:   {}", group.title);
    println!("Format:  {} / {}", group.format_kind, group.quality);
    println!(
        "Items:   {} (queued {}, downloading {}, completed {}, cancelled {}, error {})",
        group.total, s.queued, s.downloading, s.completed, s.cancelled, s.error
    );
    Ok(())
}
