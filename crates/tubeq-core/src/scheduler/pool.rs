//! Fixed-size set of worker loops.

use tokio::task::JoinHandle;

use crate::queue::Dequeued;

use super::execute::execute_job;
use super::WorkerContext;

/// Handles of the running worker loops. Size is fixed at start.
pub struct WorkerPool {
    ctx: WorkerContext,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one) on the current runtime.
    pub fn start(size: usize, ctx: WorkerContext) -> Self {
        let size = size.max(1);
        let handles = (0..size)
            .map(|worker| {
                let ctx = ctx.clone();
                tokio::spawn(worker_loop(worker, ctx))
            })
            .collect();
        tracing::info!(workers = size, "worker pool started");
        Self { ctx, handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// One sentinel per worker, then wait for every loop to exit. Jobs already
    /// queued ahead of the sentinels are still run.
    pub async fn shutdown(self) {
        for _ in 0..self.handles.len() {
            self.ctx.queue.push_shutdown();
        }
        for (worker, handle) in self.handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                tracing::error!(worker, "worker task failed: {}", e);
            }
        }
        tracing::info!("worker pool stopped");
    }
}

async fn worker_loop(worker: usize, ctx: WorkerContext) {
    tracing::debug!(worker, "worker started");
    loop {
        let lease = match ctx.queue.dequeue().await {
            Dequeued::Job(lease) => lease,
            Dequeued::Shutdown => break,
        };
        execute_job(&ctx, lease.request()).await;
        // Lease drop releases the active slot only after the record is terminal.
        drop(lease);
    }
    tracing::debug!(worker, "worker exiting");
}
