#![allow(dead_code)]

pub mod fake_fetcher;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tubeq_core::config::TubeqConfig;
use tubeq_core::types::{JobId, JobStatus};
use tubeq_core::JobManager;

use fake_fetcher::FakeFetcher;

pub struct Harness {
    pub manager: JobManager,
    pub fetcher: Arc<FakeFetcher>,
    pub download_dir: TempDir,
}

/// Manager with `workers` workers over a fresh fake fetcher and temp download dir.
pub fn start(workers: usize) -> Harness {
    let download_dir = tempfile::tempdir().unwrap();
    let cfg = TubeqConfig {
        max_concurrent_downloads: workers,
        download_dir: download_dir.path().to_path_buf(),
        ..TubeqConfig::default()
    };
    let fetcher = Arc::new(FakeFetcher::new());
    let manager = JobManager::start(&cfg, fetcher.clone()).unwrap();
    Harness {
        manager,
        fetcher,
        download_dir,
    }
}

/// Poll `cond` every 10 ms; panics after 10 s.
pub async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_status(manager: &JobManager, id: &JobId, status: JobStatus) {
    wait_for(&format!("job {id} to be {status}"), || {
        manager.job_status(id).map(|j| j.status).ok() == Some(status)
    })
    .await;
}
