//! Port to the external extraction/download tool.
//!
//! The core only depends on [`MediaFetcher`]; the yt-dlp adapter is one
//! implementation, tests plug in scripted ones. Both calls are blocking and
//! are run on the blocking thread pool by the manager and the workers.

mod format;
mod progress;
mod ytdlp;

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{FormatKind, Quality};

pub use format::format_selector;
pub use progress::{percent_complete, FetchProgress};
pub use ytdlp::{parse_probe_json, parse_progress_line, YtDlpFetcher};

/// One downloadable item discovered by a probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeItem {
    pub url: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration_secs: u64,
}

/// Outcome of resolving a URL without downloading.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    Single(ProbeItem),
    Collection {
        title: String,
        thumbnail: Option<String>,
        /// Members in source order.
        items: Vec<ProbeItem>,
    },
}

/// Parameters of one fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub quality: Quality,
    pub format_kind: FormatKind,
    /// Directory the artifact is written to.
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub output_path: PathBuf,
}

/// Returned by the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchControl {
    Continue,
    Abort,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// The progress callback asked to stop.
    #[error("Cancelled by user")]
    Aborted,

    /// The tool reported a failure; message is kept verbatim.
    #[error("{0}")]
    Tool(String),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected tool output: {0}")]
    Parse(String),
}

/// Blocking extraction/download collaborator.
///
/// `fetch` must invoke `on_progress` at bounded intervals while transferring
/// and stop with [`FetchError::Aborted`] as soon as it returns
/// [`FetchControl::Abort`]; that is the only way cancellation reaches it.
pub trait MediaFetcher: Send + Sync {
    fn probe(&self, url: &str) -> Result<ProbeResult, FetchError>;

    fn fetch(
        &self,
        request: &FetchRequest,
        on_progress: &mut dyn FnMut(FetchProgress) -> FetchControl,
    ) -> Result<FetchOutcome, FetchError>;
}
