//! Run one dequeued job to a terminal status.

use std::sync::Arc;

use crate::fetcher::{FetchControl, FetchError, FetchOutcome, FetchProgress, FetchRequest};
use crate::queue::JobRequest;
use crate::storage::ArtifactStore;
use crate::types::{JobId, JobRecord};

use super::WorkerContext;

pub(super) async fn execute_job(ctx: &WorkerContext, request: &JobRequest) {
    let job_id = request.job_id;
    let token = ctx
        .cancels
        .token(&job_id)
        .unwrap_or_else(|| ctx.cancels.register(job_id));

    match ctx.store.update_job(&job_id, JobRecord::begin_download) {
        Some(true) => {}
        Some(false) => {
            tracing::warn!(%job_id, "dequeued job is not queued; skipping");
            return;
        }
        None => {
            tracing::warn!(%job_id, "dequeued job has no status record; skipping");
            return;
        }
    }

    // Cancelled while waiting: never start the fetch.
    if token.is_cancelled() {
        ctx.store.update_job(&job_id, JobRecord::cancel);
        tracing::info!(%job_id, "job cancelled before start");
        return;
    }

    tracing::info!(%job_id, url = %request.url, quality = %request.quality, format = %request.format_kind, "download started");

    let fetch_request = FetchRequest {
        url: request.url.clone(),
        quality: request.quality,
        format_kind: request.format_kind,
        output_dir: ctx.artifacts.dir().to_path_buf(),
    };
    let fetcher = Arc::clone(&ctx.fetcher);
    let store = Arc::clone(&ctx.store);
    let progress_token = token.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut on_progress = |p: FetchProgress| {
            if progress_token.is_cancelled() {
                return FetchControl::Abort;
            }
            store.update_job(&job_id, |job| job.record_progress(p.percent(), p.rate()));
            FetchControl::Continue
        };
        fetcher.fetch(&fetch_request, &mut on_progress)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => finish_completed(ctx, job_id, outcome),
        Ok(Err(e)) => finish_failed(ctx, job_id, token.is_cancelled(), e),
        Err(e) => {
            tracing::error!(%job_id, "download task panicked or was aborted: {}", e);
            ctx.store
                .update_job(&job_id, |job| job.fail(format!("download task failed: {e}")));
        }
    }
}

fn finish_completed(ctx: &WorkerContext, job_id: JobId, outcome: FetchOutcome) {
    match ArtifactStore::artifact_name(&outcome.output_path) {
        Some(name) => {
            tracing::info!(%job_id, file = %name, "download completed");
            ctx.store.update_job(&job_id, |job| job.complete(name));
        }
        None => {
            let message = format!(
                "tool reported an unusable output path: {}",
                outcome.output_path.display()
            );
            tracing::warn!(%job_id, "{}", message);
            ctx.store.update_job(&job_id, |job| job.fail(message));
        }
    }
}

fn finish_failed(ctx: &WorkerContext, job_id: JobId, cancelled: bool, err: FetchError) {
    // Any failure while the flag is set counts as a cancellation.
    if cancelled || matches!(err, FetchError::Aborted) {
        tracing::info!(%job_id, "download cancelled");
        ctx.store.update_job(&job_id, JobRecord::cancel);
        return;
    }
    tracing::warn!(%job_id, "download failed: {}", err);
    let message = err.to_string();
    ctx.store.update_job(&job_id, |job| job.fail(message));
}
