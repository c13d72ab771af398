//! Admission and aggregation: the public face of the job subsystem.
//!
//! `JobManager` owns the queue, status store, cancellation registry and the
//! worker pool. Submissions are probed, turned into job (and group) records
//! and enqueued; every other operation reads or edits the store.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::checksum::sha256_file;
use crate::config::TubeqConfig;
use crate::control::CancellationRegistry;
use crate::error::{QueueError, QueueResult};
use crate::fetcher::{FetchError, MediaFetcher, ProbeItem, ProbeResult};
use crate::queue::{JobQueue, JobRequest};
use crate::scheduler::{WorkerContext, WorkerPool};
use crate::storage::ArtifactStore;
use crate::store::StatusStore;
use crate::types::{
    FormatKind, GroupId, GroupRecord, GroupStatus, JobId, JobRecord, JobStatus, PlaylistSlot,
    Quality,
};

/// Identifiers returned by [`JobManager::submit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Submission {
    Single {
        job_id: JobId,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail: Option<String>,
    },
    Group {
        group_id: GroupId,
        /// Member ids in playlist order.
        job_ids: Vec<JobId>,
        title: String,
        count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearedCounts {
    pub jobs: usize,
    pub groups: usize,
}

/// Bytes of a completed artifact plus the name it was saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Queue-position hint for a job admitted while `load` jobs are queued or
/// running on a pool of `pool_size` workers.
pub fn queue_message(load: usize, pool_size: usize) -> String {
    if load < pool_size {
        "Starting soon...".to_string()
    } else {
        format!("Queued (#{})", load - pool_size + 1)
    }
}

pub struct JobManager {
    store: Arc<StatusStore>,
    cancels: Arc<CancellationRegistry>,
    queue: Arc<JobQueue>,
    fetcher: Arc<dyn MediaFetcher>,
    artifacts: ArtifactStore,
    pool_size: usize,
    pool: Mutex<Option<WorkerPool>>,
    next_seq: AtomicU64,
}

impl JobManager {
    /// Create the download directory and start the worker pool. Must be
    /// called from within a tokio runtime.
    pub fn start(cfg: &TubeqConfig, fetcher: Arc<dyn MediaFetcher>) -> QueueResult<Self> {
        let artifacts = ArtifactStore::new(&cfg.download_dir);
        artifacts.ensure_dir()?;

        let store = Arc::new(StatusStore::new());
        let cancels = Arc::new(CancellationRegistry::new());
        let queue = Arc::new(JobQueue::new());
        let pool_size = cfg.worker_count();

        let pool = WorkerPool::start(
            pool_size,
            WorkerContext {
                queue: Arc::clone(&queue),
                store: Arc::clone(&store),
                cancels: Arc::clone(&cancels),
                fetcher: Arc::clone(&fetcher),
                artifacts: artifacts.clone(),
            },
        );
        tracing::info!(
            download_dir = %artifacts.dir().display(),
            workers = pool_size,
            "job manager started"
        );

        Ok(Self {
            store,
            cancels,
            queue,
            fetcher,
            artifacts,
            pool_size,
            pool: Mutex::new(Some(pool)),
            next_seq: AtomicU64::new(0),
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn download_dir(&self) -> &Path {
        self.artifacts.dir()
    }

    /// Probe `url` and admit one job, or one group of jobs for a playlist.
    /// Nothing is created when the probe fails.
    pub async fn submit(
        &self,
        url: &str,
        quality: Quality,
        format_kind: FormatKind,
    ) -> QueueResult<Submission> {
        let url = url.trim();
        if url.is_empty() {
            return Err(QueueError::EmptyUrl);
        }

        let fetcher = Arc::clone(&self.fetcher);
        let probe_url = url.to_string();
        let probed = tokio::task::spawn_blocking(move || fetcher.probe(&probe_url))
            .await
            .map_err(|e| QueueError::Probe(FetchError::Tool(format!("probe task failed: {e}"))))?;
        let probed = match probed {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(url, "probe failed: {}", e);
                return Err(QueueError::Probe(e));
            }
        };

        match probed {
            ProbeResult::Single(item) => {
                let job_id = JobId::new();
                let title = item.title.clone();
                let thumbnail = item.thumbnail.clone();
                self.admit(job_id, item, quality, format_kind, None);
                tracing::info!(%job_id, url, "job submitted");
                Ok(Submission::Single {
                    job_id,
                    title,
                    thumbnail,
                })
            }
            ProbeResult::Collection {
                title,
                thumbnail,
                items,
            } => {
                let group_id = GroupId::new();
                let count = items.len();
                let job_ids: Vec<JobId> = items.iter().map(|_| JobId::new()).collect();

                for (index, (job_id, item)) in job_ids.iter().zip(items).enumerate() {
                    let slot = PlaylistSlot {
                        group_id,
                        group_title: title.clone(),
                        index: index + 1,
                        count,
                    };
                    self.admit(*job_id, item, quality, format_kind, Some(slot));
                }

                // Members first: a group with no present members is treated
                // as empty by `clear_inactive`.
                self.store.insert_group(GroupRecord {
                    id: group_id,
                    title: title.clone(),
                    expected_count: count,
                    thumbnail: thumbnail.clone(),
                    quality,
                    format_kind,
                    member_job_ids: job_ids.clone(),
                });
                tracing::info!(%group_id, url, count, "playlist submitted");
                Ok(Submission::Group {
                    group_id,
                    job_ids,
                    title,
                    count,
                    thumbnail,
                })
            }
        }
    }

    /// Register, record and enqueue one job. The message is computed from the
    /// load at this instant and never renumbered.
    fn admit(
        &self,
        job_id: JobId,
        item: ProbeItem,
        quality: Quality,
        format_kind: FormatKind,
        playlist: Option<PlaylistSlot>,
    ) {
        let message = queue_message(self.queue.load(), self.pool_size);
        let url = item.url;
        let mut record = JobRecord::queued(
            job_id,
            url.clone(),
            item.title,
            item.thumbnail,
            item.duration_secs,
            quality,
            format_kind,
            message,
        );
        record.playlist = playlist;
        record.seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        self.cancels.register(job_id);
        self.store.insert_job(record);
        self.queue.enqueue(JobRequest {
            job_id,
            url,
            quality,
            format_kind,
        });
    }

    pub fn job_status(&self, id: &JobId) -> QueueResult<JobRecord> {
        self.store.job(id).ok_or(QueueError::JobNotFound(*id))
    }

    /// Every job in admission order.
    pub fn list_jobs(&self) -> Vec<JobRecord> {
        self.store.list_jobs()
    }

    pub fn group_status(&self, id: &GroupId) -> QueueResult<GroupStatus> {
        self.store
            .group_status(id)
            .ok_or(QueueError::GroupNotFound(*id))
    }

    /// Set the job's cancellation flag. A queued job is cancelled when a
    /// worker reaches it; a running one at its next progress report.
    /// Terminal jobs are unaffected.
    pub fn cancel_job(&self, id: &JobId) -> QueueResult<()> {
        if self.store.job(id).is_none() {
            return Err(QueueError::JobNotFound(*id));
        }
        if !self.cancels.request_cancel(id) {
            self.cancels.register(*id).cancel();
        }
        tracing::info!(job_id = %id, "cancellation requested");
        Ok(())
    }

    /// Flag every member still queued or downloading; returns how many.
    pub fn cancel_group(&self, id: &GroupId) -> QueueResult<usize> {
        let group = self.store.group(id).ok_or(QueueError::GroupNotFound(*id))?;
        let mut cancelled = 0usize;
        for job_id in &group.member_job_ids {
            let active = self
                .store
                .job(job_id)
                .is_some_and(|job| job.status.is_active());
            if active {
                if !self.cancels.request_cancel(job_id) {
                    self.cancels.register(*job_id).cancel();
                }
                cancelled += 1;
            }
        }
        tracing::info!(group_id = %id, cancelled, "group cancellation requested");
        Ok(cancelled)
    }

    /// Remove a terminal job and its flag.
    pub fn delete_job(&self, id: &JobId) -> QueueResult<()> {
        self.store.remove_terminal_job(id)?;
        self.cancels.remove(id);
        tracing::info!(job_id = %id, "job deleted");
        Ok(())
    }

    /// Remove the group's terminal members and the group record itself.
    /// Members still running are left in place. Returns how many were removed.
    pub fn delete_group(&self, id: &GroupId) -> QueueResult<usize> {
        let group = self.store.group(id).ok_or(QueueError::GroupNotFound(*id))?;
        let mut deleted = 0usize;
        for job_id in &group.member_job_ids {
            match self.store.remove_terminal_job(job_id) {
                Ok(_) => {
                    self.cancels.remove(job_id);
                    deleted += 1;
                }
                Err(QueueError::JobActive { status, .. }) => {
                    tracing::debug!(job_id = %job_id, %status, "keeping active group member");
                }
                Err(_) => {}
            }
        }
        self.store.remove_group(id);
        tracing::info!(group_id = %id, deleted, "group deleted");
        Ok(deleted)
    }

    /// Delete every terminal job, then every group left without members.
    pub fn clear_inactive(&self) -> ClearedCounts {
        let jobs = self.store.remove_all_terminal_jobs();
        for id in &jobs {
            self.cancels.remove(id);
        }
        let groups = self.store.remove_empty_groups();
        let counts = ClearedCounts {
            jobs: jobs.len(),
            groups: groups.len(),
        };
        tracing::info!(jobs = counts.jobs, groups = counts.groups, "cleared inactive");
        counts
    }

    /// Name and on-disk path of a completed job's artifact.
    async fn completed_artifact(&self, id: &JobId) -> QueueResult<(String, PathBuf)> {
        let job = self.job_status(id)?;
        if job.status != JobStatus::Completed {
            return Err(QueueError::NotCompleted {
                id: *id,
                status: job.status,
            });
        }
        let file_name = job.output_file.ok_or(QueueError::ArtifactMissing(*id))?;
        let path = self
            .artifacts
            .resolve(&file_name)
            .ok_or(QueueError::ArtifactMissing(*id))?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok((file_name, path)),
            Ok(_) => Err(QueueError::ArtifactMissing(*id)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(QueueError::ArtifactMissing(*id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn artifact_path(&self, id: &JobId) -> QueueResult<PathBuf> {
        self.completed_artifact(id).await.map(|(_, path)| path)
    }

    pub async fn fetch_artifact(&self, id: &JobId) -> QueueResult<Artifact> {
        let (file_name, path) = self.completed_artifact(id).await?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => QueueError::ArtifactMissing(*id),
            _ => QueueError::Io(e),
        })?;
        Ok(Artifact { file_name, bytes })
    }

    /// Hex SHA-256 of a completed artifact.
    pub async fn artifact_checksum(&self, id: &JobId) -> QueueResult<String> {
        let path = self.artifact_path(id).await?;
        let digest = tokio::task::spawn_blocking(move || sha256_file(&path))
            .await
            .map_err(|e| QueueError::Io(io::Error::other(e.to_string())))??;
        Ok(digest)
    }

    /// Delete every file in the download directory. Refused while anything
    /// is downloading. Job records are kept.
    pub async fn clean_storage(&self) -> QueueResult<usize> {
        let downloading = self
            .store
            .list_jobs()
            .iter()
            .filter(|job| job.status == JobStatus::Downloading)
            .count();
        if downloading > 0 {
            return Err(QueueError::StorageBusy(downloading));
        }
        let artifacts = self.artifacts.clone();
        let removed = tokio::task::spawn_blocking(move || artifacts.remove_all_files())
            .await
            .map_err(|e| QueueError::Io(io::Error::other(e.to_string())))??;
        tracing::info!(removed, "download directory cleaned");
        Ok(removed)
    }

    /// Stop the workers: one sentinel each, then wait for them to exit.
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let pool = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = pool {
            tracing::info!(workers = pool.size(), "shutting down worker pool");
            pool.shutdown().await;
        }
    }
}
