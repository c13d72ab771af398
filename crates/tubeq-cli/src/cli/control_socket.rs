//! Control socket: server (during `tubeq serve`) and client (every other
//! subcommand). Protocol: see [`super::protocol`].

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tubeq_core::{JobManager, QueueResult};

use super::protocol::{Request, Response};

fn reply<T: Serialize>(result: QueueResult<T>) -> Response {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(value) => Response::Ok(value),
            Err(e) => Response::error("internal", e.to_string()),
        },
        Err(e) => Response::from(&e),
    }
}

/// Run one request against the manager.
pub async fn handle_request(manager: &JobManager, request: Request) -> Response {
    match request {
        Request::Submit {
            url,
            quality,
            format_kind,
        } => reply(manager.submit(&url, quality, format_kind).await),
        Request::Status { job_id } => reply(manager.job_status(&job_id)),
        Request::List => reply(QueueResult::Ok(manager.list_jobs())),
        Request::Group { group_id } => reply(manager.group_status(&group_id)),
        Request::Cancel { job_id } => reply(manager.cancel_job(&job_id)),
        Request::CancelGroup { group_id } => reply(manager.cancel_group(&group_id)),
        Request::Delete { job_id } => reply(manager.delete_job(&job_id)),
        Request::DeleteGroup { group_id } => reply(manager.delete_group(&group_id)),
        Request::Clear => reply(QueueResult::Ok(manager.clear_inactive())),
        Request::ArtifactPath { job_id } => reply(manager.artifact_path(&job_id).await),
        Request::Checksum { job_id } => reply(manager.artifact_checksum(&job_id).await),
        Request::CleanStorage => reply(manager.clean_storage().await),
    }
}

async fn serve_connection(manager: Arc<JobManager>, stream: UnixStream) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                tracing::debug!(?request, "control request");
                handle_request(&manager, request).await
            }
            Err(e) => Response::error("invalid_request", format!("malformed request: {e}")),
        };
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        write_half.write_all(&out).await?;
    }
    Ok(())
}

/// Bind `path` (replacing a stale socket file) and spawn a task that serves
/// each connection until the handle is aborted.
pub fn spawn_control_listener(
    manager: Arc<JobManager>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create socket dir {}", parent.display()))?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let manager = Arc::clone(&manager);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(manager, stream).await {
                            tracing::debug!("control connection: {}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Send one request and wait for its response.
pub async fn send_request(socket_path: &Path, request: &Request) -> Result<Response> {
    let stream = UnixStream::connect(socket_path).await.with_context(|| {
        format!(
            "connect to {} (is `tubeq serve` running?)",
            socket_path.display()
        )
    })?;
    let (read_half, mut write_half) = stream.into_split();

    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');
    write_half.write_all(&line).await?;

    let mut lines = BufReader::new(read_half).lines();
    let reply = lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow!("control socket closed without a response"))?;
    serde_json::from_str(&reply).context("parse control socket response")
}

/// Like [`send_request`], but turns an error response into an `Err`.
pub async fn call(socket_path: &Path, request: &Request) -> Result<serde_json::Value> {
    match send_request(socket_path, request).await? {
        Response::Ok(value) => Ok(value),
        Response::Error { kind, message } => Err(anyhow!("{message} ({kind})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubeq_core::config::TubeqConfig;
    use tubeq_core::fetcher::{
        FetchControl, FetchError, FetchOutcome, FetchProgress, FetchRequest, MediaFetcher,
        ProbeResult,
    };
    use tubeq_core::types::{FormatKind, JobId, Quality};

    /// Fetcher that cannot resolve anything.
    struct Offline;

    impl MediaFetcher for Offline {
        fn probe(&self, url: &str) -> Result<ProbeResult, FetchError> {
            Err(FetchError::Tool(format!("ERROR: Unsupported URL: {url}")))
        }

        fn fetch(
            &self,
            _request: &FetchRequest,
            _on_progress: &mut dyn FnMut(FetchProgress) -> FetchControl,
        ) -> Result<FetchOutcome, FetchError> {
            Err(FetchError::Tool("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn socket_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TubeqConfig {
            max_concurrent_downloads: 1,
            download_dir: dir.path().join("downloads"),
            ..TubeqConfig::default()
        };
        let manager = Arc::new(JobManager::start(&cfg, Arc::new(Offline)).unwrap());
        let socket = dir.path().join("run").join("control.sock");
        let server = spawn_control_listener(Arc::clone(&manager), &socket).unwrap();

        let listed = call(&socket, &Request::List).await.unwrap();
        assert_eq!(listed, serde_json::json!([]));

        let submitted = send_request(
            &socket,
            &Request::Submit {
                url: "https://example.com/nothing".to_string(),
                quality: Quality::Best,
                format_kind: FormatKind::Video,
            },
        )
        .await
        .unwrap();
        match submitted {
            Response::Error { kind, message } => {
                assert_eq!(kind, "probe_failure");
                assert!(message.starts_with("Failed to extract info: "));
            }
            other => panic!("expected error, got {other:?}"),
        }

        let missing = send_request(&socket, &Request::Status { job_id: JobId::new() })
            .await
            .unwrap();
        assert!(matches!(missing, Response::Error { ref kind, .. } if kind == "not_found"));

        let cleared = call(&socket, &Request::Clear).await.unwrap();
        assert_eq!(cleared, serde_json::json!({"jobs": 0, "groups": 0}));

        server.abort();
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_line_gets_error_response() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TubeqConfig {
            download_dir: dir.path().join("downloads"),
            ..TubeqConfig::default()
        };
        let manager = Arc::new(JobManager::start(&cfg, Arc::new(Offline)).unwrap());
        let socket = dir.path().join("control.sock");
        let server = spawn_control_listener(Arc::clone(&manager), &socket).unwrap();

        let stream = UnixStream::connect(&socket).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(b"not json\n").await.unwrap();
        let mut lines = BufReader::new(read_half).lines();
        let reply: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(matches!(reply, Response::Error { ref kind, .. } if kind == "invalid_request"));

        server.abort();
        manager.shutdown().await;
    }
}
