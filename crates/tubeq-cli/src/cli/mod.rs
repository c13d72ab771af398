//! CLI for the tubeq media download queue.

mod commands;
mod control_socket;
mod protocol;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tubeq_core::config;
use tubeq_core::types::{FormatKind, GroupId, JobId, Quality};

use commands::{
    run_cancel, run_cancel_group, run_checksum, run_clean_storage, run_clear, run_delete,
    run_delete_group, run_fetch, run_group, run_serve, run_status, run_submit,
};

/// Top-level CLI for the tubeq media download queue.
#[derive(Debug, Parser)]
#[command(name = "tubeq")]
#[command(about = "tubeq: queue and download videos and playlists with yt-dlp", long_about = None)]
pub struct Cli {
    /// Control socket path (default: from config, else the XDG state dir).
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the download workers and the control socket until Ctrl-C.
    Serve,

    /// Queue a video, or every item of a playlist.
    Submit {
        /// Video or playlist URL.
        url: String,
        /// best, 2160p, 1440p, 1080p, 720p, 480p or 360p.
        #[arg(long, default_value = "best")]
        quality: Quality,
        /// video, audio_mp3 (mp3) or audio_m4a (m4a).
        #[arg(long, default_value = "video")]
        format: FormatKind,
    },

    /// Show one job, or list all jobs.
    Status {
        /// Job identifier.
        id: Option<JobId>,
    },

    /// Show aggregate status of a playlist group.
    Group {
        /// Group identifier.
        id: GroupId,
    },

    /// Cancel a queued or running job.
    Cancel {
        /// Job identifier.
        id: JobId,
    },

    /// Cancel every queued or running job of a group.
    CancelGroup {
        /// Group identifier.
        id: GroupId,
    },

    /// Delete a finished job.
    Delete {
        /// Job identifier.
        id: JobId,
    },

    /// Delete a group and its finished jobs.
    DeleteGroup {
        /// Group identifier.
        id: GroupId,
    },

    /// Delete every finished job and every emptied group.
    Clear,

    /// Copy a completed download to a directory.
    Fetch {
        /// Job identifier.
        id: JobId,
        /// Destination directory (default: current directory).
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Print the SHA-256 of a completed download.
    Checksum {
        /// Job identifier.
        id: JobId,
    },

    /// Delete every file in the download directory.
    CleanStorage,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let socket = match cli.socket {
            Some(path) => path,
            None => cfg.control_socket_path()?,
        };

        match cli.command {
            CliCommand::Serve => run_serve(&cfg, &socket).await?,
            CliCommand::Submit {
                url,
                quality,
                format,
            } => run_submit(&socket, &url, quality, format).await?,
            CliCommand::Status { id } => run_status(&socket, id).await?,
            CliCommand::Group { id } => run_group(&socket, id).await?,
            CliCommand::Cancel { id } => run_cancel(&socket, id).await?,
            CliCommand::CancelGroup { id } => run_cancel_group(&socket, id).await?,
            CliCommand::Delete { id } => run_delete(&socket, id).await?,
            CliCommand::DeleteGroup { id } => run_delete_group(&socket, id).await?,
            CliCommand::Clear => run_clear(&socket).await?,
            CliCommand::Fetch { id, output } => run_fetch(&socket, id, output.as_deref()).await?,
            CliCommand::Checksum { id } => run_checksum(&socket, id).await?,
            CliCommand::CleanStorage => run_clean_storage(&socket).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
