//! Scripted in-process `MediaFetcher` for integration tests.
//!
//! Probe answers are registered per URL. Fetches report progress every
//! ~10 ms; a held URL keeps reporting until released, so tests can pin jobs
//! in `Downloading`. Completed fetches write `<slug>.mp4` into the output dir
//! with the URL as content.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use tubeq_core::fetcher::{
    FetchControl, FetchError, FetchOutcome, FetchProgress, FetchRequest, MediaFetcher, ProbeItem,
    ProbeResult,
};

const TICK: Duration = Duration::from_millis(10);

#[derive(Default)]
struct State {
    probes: HashMap<String, Result<ProbeResult, String>>,
    held: HashSet<String>,
    failures: HashMap<String, String>,
    started: Vec<String>,
    running: usize,
    max_running: usize,
}

#[derive(Default)]
pub struct FakeFetcher {
    state: Mutex<State>,
    released: Condvar,
}

pub fn item(url: &str, title: &str) -> ProbeItem {
    ProbeItem {
        url: url.to_string(),
        title: title.to_string(),
        thumbnail: Some(format!("{url}/thumb.jpg")),
        duration_secs: 60,
    }
}

/// File name a completed fetch of `url` writes.
pub fn artifact_name(url: &str) -> String {
    let slug: String = url
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{slug}.mp4")
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn single(&self, url: &str, title: &str) {
        self.lock()
            .probes
            .insert(url.to_string(), Ok(ProbeResult::Single(item(url, title))));
    }

    /// Playlist at `url` whose members are `item_urls`, in order.
    pub fn playlist(&self, url: &str, title: &str, item_urls: &[&str]) {
        let items = item_urls
            .iter()
            .enumerate()
            .map(|(i, u)| item(u, &format!("{title} #{}", i + 1)))
            .collect();
        self.lock().probes.insert(
            url.to_string(),
            Ok(ProbeResult::Collection {
                title: title.to_string(),
                thumbnail: Some(format!("{url}/cover.jpg")),
                items,
            }),
        );
    }

    pub fn probe_error(&self, url: &str, message: &str) {
        self.lock()
            .probes
            .insert(url.to_string(), Err(message.to_string()));
    }

    pub fn fail_fetch(&self, url: &str, message: &str) {
        self.lock()
            .failures
            .insert(url.to_string(), message.to_string());
    }

    /// Fetches of `url` keep running until released (or aborted).
    pub fn hold(&self, url: &str) {
        self.lock().held.insert(url.to_string());
    }

    pub fn release(&self, url: &str) {
        self.lock().held.remove(url);
        self.released.notify_all();
    }

    pub fn release_all(&self) {
        self.lock().held.clear();
        self.released.notify_all();
    }

    pub fn fetch_started(&self, url: &str) -> bool {
        self.lock().started.iter().any(|u| u == url)
    }

    pub fn max_concurrent(&self) -> usize {
        self.lock().max_running
    }

    fn finish(&self) {
        self.lock().running -= 1;
    }

    fn run(
        &self,
        request: &FetchRequest,
        on_progress: &mut dyn FnMut(FetchProgress) -> FetchControl,
    ) -> Result<FetchOutcome, FetchError> {
        let mut downloaded = 0u64;
        let mut report = |downloaded: u64| {
            on_progress(FetchProgress {
                downloaded_bytes: downloaded,
                total_bytes: Some(100),
                bytes_per_sec: Some(1024.0),
            })
        };

        // Two ticks minimum, then keep ticking while held.
        for _ in 0..2 {
            downloaded += 10;
            if report(downloaded) == FetchControl::Abort {
                return Err(FetchError::Aborted);
            }
            std::thread::sleep(TICK);
        }
        loop {
            let guard = self.lock();
            if !guard.held.contains(&request.url) {
                break;
            }
            let (guard, _) = self.released.wait_timeout(guard, TICK).unwrap();
            drop(guard);
            downloaded = (downloaded + 5).min(50);
            if report(downloaded) == FetchControl::Abort {
                return Err(FetchError::Aborted);
            }
        }

        if let Some(message) = self.lock().failures.get(&request.url).cloned() {
            return Err(FetchError::Tool(message));
        }
        if report(100) == FetchControl::Abort {
            return Err(FetchError::Aborted);
        }

        let path: PathBuf = request.output_dir.join(artifact_name(&request.url));
        std::fs::write(&path, request.url.as_bytes())
            .map_err(|e| FetchError::Tool(format!("ERROR: write failed: {e}")))?;
        Ok(FetchOutcome { output_path: path })
    }
}

impl MediaFetcher for FakeFetcher {
    fn probe(&self, url: &str) -> Result<ProbeResult, FetchError> {
        match self.lock().probes.get(url) {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(message)) => Err(FetchError::Tool(message.clone())),
            None => Err(FetchError::Tool(format!("ERROR: Unsupported URL: {url}"))),
        }
    }

    fn fetch(
        &self,
        request: &FetchRequest,
        on_progress: &mut dyn FnMut(FetchProgress) -> FetchControl,
    ) -> Result<FetchOutcome, FetchError> {
        {
            let mut state = self.lock();
            state.started.push(request.url.clone());
            state.running += 1;
            state.max_running = state.max_running.max(state.running);
        }
        let result = self.run(request, on_progress);
        self.finish();
        result
    }
}
