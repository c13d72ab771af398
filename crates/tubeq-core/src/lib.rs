pub mod config;
pub mod logging;

pub mod checksum;
pub mod control;
pub mod error;
pub mod fetcher;
pub mod manager;
pub mod queue;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod types;

pub use error::{ErrorKind, QueueError, QueueResult};
pub use manager::{Artifact, ClearedCounts, JobManager, Submission};
