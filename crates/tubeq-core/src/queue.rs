//! Unbounded FIFO of job requests shared by the admission path and workers.
//!
//! `enqueue` never blocks. `dequeue` waits for the next item and hands it out
//! to exactly one worker. The queue also tracks load (queued + active) so
//! admission can compute a queue-position hint. Load is one counter, raised
//! on enqueue and lowered when the lease drops, so a dequeue moving a job from
//! queued to active never shows up as a change in load.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::types::{FormatKind, JobId, Quality};

/// What a worker needs to execute one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub job_id: JobId,
    pub url: String,
    pub quality: Quality,
    pub format_kind: FormatKind,
}

enum QueueItem {
    Job(JobRequest),
    Shutdown,
}

#[derive(Debug, Default)]
struct Load {
    queued: AtomicUsize,
    /// queued + active
    outstanding: AtomicUsize,
}

/// A dequeued job. Counts as active until dropped.
#[derive(Debug)]
pub struct JobLease {
    request: JobRequest,
    load: Arc<Load>,
}

impl JobLease {
    pub fn request(&self) -> &JobRequest {
        &self.request
    }
}

impl Drop for JobLease {
    fn drop(&mut self) {
        self.load.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Result of a blocking dequeue.
#[derive(Debug)]
pub enum Dequeued {
    Job(JobLease),
    Shutdown,
}

pub struct JobQueue {
    tx: mpsc::UnboundedSender<QueueItem>,
    rx: Mutex<mpsc::UnboundedReceiver<QueueItem>>,
    load: Arc<Load>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            load: Arc::new(Load::default()),
        }
    }

    /// Append a job at the tail. Never blocks.
    pub fn enqueue(&self, request: JobRequest) {
        self.load.outstanding.fetch_add(1, Ordering::AcqRel);
        self.load.queued.fetch_add(1, Ordering::AcqRel);
        let job_id = request.job_id;
        if self.tx.send(QueueItem::Job(request)).is_err() {
            // Receiver lives in `self`, so this only happens mid-drop.
            self.load.queued.fetch_sub(1, Ordering::AcqRel);
            self.load.outstanding.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!(%job_id, "job queue closed; request dropped");
        }
    }

    /// Append a shutdown sentinel; the worker that dequeues it exits.
    pub fn push_shutdown(&self) {
        let _ = self.tx.send(QueueItem::Shutdown);
    }

    /// Wait for the next item. Each item is delivered to exactly one caller.
    pub async fn dequeue(&self) -> Dequeued {
        let item = {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        };
        match item {
            Some(QueueItem::Job(request)) => {
                // Still counted in `outstanding` until the lease drops.
                self.load.queued.fetch_sub(1, Ordering::AcqRel);
                Dequeued::Job(JobLease {
                    request,
                    load: Arc::clone(&self.load),
                })
            }
            Some(QueueItem::Shutdown) | None => Dequeued::Shutdown,
        }
    }

    /// Jobs waiting to be dequeued.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.load.queued.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Jobs dequeued and still held by a worker.
    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.load().saturating_sub(self.len())
    }

    /// `active + queued`, read as one counter.
    pub fn load(&self) -> usize {
        self.load.outstanding.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(n: usize) -> JobRequest {
        JobRequest {
            job_id: JobId::new(),
            url: format!("https://example.com/{n}"),
            quality: Quality::Best,
            format_kind: FormatKind::Video,
        }
    }

    #[tokio::test]
    async fn fifo_order() {
        let q = JobQueue::new();
        for n in 0..5 {
            q.enqueue(request(n));
        }
        assert_eq!(q.len(), 5);
        for n in 0..5 {
            match q.dequeue().await {
                Dequeued::Job(lease) => {
                    assert_eq!(lease.request().url, format!("https://example.com/{n}"))
                }
                Dequeued::Shutdown => panic!("unexpected shutdown"),
            }
        }
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn lease_counts_as_active_until_dropped() {
        let q = JobQueue::new();
        q.enqueue(request(1));
        q.enqueue(request(2));
        assert_eq!(q.load(), 2);

        let lease = match q.dequeue().await {
            Dequeued::Job(l) => l,
            Dequeued::Shutdown => panic!("unexpected shutdown"),
        };
        assert_eq!(q.active(), 1);
        assert_eq!(q.len(), 1);
        assert_eq!(q.load(), 2);

        drop(lease);
        assert_eq!(q.active(), 0);
        assert_eq!(q.load(), 1);
    }

    #[tokio::test]
    async fn shutdown_sentinel_is_delivered_in_order() {
        let q = JobQueue::new();
        q.enqueue(request(1));
        q.push_shutdown();
        assert!(matches!(q.dequeue().await, Dequeued::Job(_)));
        assert!(matches!(q.dequeue().await, Dequeued::Shutdown));
    }

    #[tokio::test]
    async fn dequeue_waits_for_enqueue() {
        let q = Arc::new(JobQueue::new());
        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move {
                match q.dequeue().await {
                    Dequeued::Job(lease) => lease.request().url.clone(),
                    Dequeued::Shutdown => String::new(),
                }
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        q.enqueue(request(7));
        assert_eq!(waiter.await.unwrap(), "https://example.com/7");
    }
}
