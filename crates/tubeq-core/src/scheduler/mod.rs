//! Worker pool that drains the job queue.
//!
//! A fixed number of worker loops share one [`JobQueue`]; each dequeued job is
//! run to a terminal status (completed, cancelled, or error) before the worker
//! takes the next one. Workers exit when they dequeue a shutdown sentinel.

mod execute;
mod pool;

use std::sync::Arc;

use crate::control::CancellationRegistry;
use crate::fetcher::MediaFetcher;
use crate::queue::JobQueue;
use crate::storage::ArtifactStore;
use crate::store::StatusStore;

pub use pool::WorkerPool;

/// Shared state every worker reads and writes.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<JobQueue>,
    pub store: Arc<StatusStore>,
    pub cancels: Arc<CancellationRegistry>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub artifacts: ArtifactStore,
}
