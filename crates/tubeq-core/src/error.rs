//! Errors returned synchronously by the job manager.
//!
//! Execution-time failures (tool errors, user cancellation) never show up
//! here: workers record them into the job and callers see them by polling.

use thiserror::Error;

use crate::fetcher::FetchError;
use crate::types::{GroupId, JobId, JobStatus};

/// Coarse classification used by the control socket and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    ProbeFailure,
    InvalidRequest,
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::ProbeFailure => "probe_failure",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Io => "io",
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    #[error("job {id} is {status}; cancel it first")]
    JobActive { id: JobId, status: JobStatus },

    #[error("download not completed (job {id} is {status})")]
    NotCompleted { id: JobId, status: JobStatus },

    #[error("file for job {0} does not exist")]
    ArtifactMissing(JobId),

    #[error("{0} download(s) in progress; wait for them or cancel them first")]
    StorageBusy(usize),

    #[error("no URL provided")]
    EmptyUrl,

    #[error("Failed to extract info: {0}")]
    Probe(#[source] FetchError),

    #[error("storage: {0}")]
    Io(#[from] std::io::Error),
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueueError::JobNotFound(_)
            | QueueError::GroupNotFound(_)
            | QueueError::ArtifactMissing(_) => ErrorKind::NotFound,
            QueueError::JobActive { .. }
            | QueueError::NotCompleted { .. }
            | QueueError::StorageBusy(_) => ErrorKind::Conflict,
            QueueError::Probe(_) => ErrorKind::ProbeFailure,
            QueueError::EmptyUrl => ErrorKind::InvalidRequest,
            QueueError::Io(_) => ErrorKind::Io,
        }
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
