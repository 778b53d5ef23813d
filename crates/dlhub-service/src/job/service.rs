//! Download service: accepts batch submissions and serves status reads.

use std::sync::Arc;

use chrono::Utc;

use dlhub_core::error::AppError;
use dlhub_core::result::AppResult;
use dlhub_core::retry::WriteRetry;
use dlhub_core::traits::{QueueStats, StatusStore};
use dlhub_entity::{DownloadJob, FileStatus, JobStage, JobStatus, Progress, StatusPatch};
use dlhub_worker::JobQueue;

use super::request::{SubmitRequest, SubmitResponse};

/// Handles batch download submissions and status lookups.
#[derive(Clone)]
pub struct DownloadService {
    /// Status store.
    store: Arc<dyn StatusStore>,
    /// Job queue.
    queue: Arc<JobQueue>,
    /// Retry policy for status reads and writes.
    write_retry: WriteRetry,
}

impl std::fmt::Debug for DownloadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadService").finish()
    }
}

impl DownloadService {
    /// Creates a new download service.
    pub fn new(store: Arc<dyn StatusStore>, queue: Arc<JobQueue>) -> Self {
        Self {
            store,
            queue,
            write_retry: WriteRetry::default(),
        }
    }

    /// Overrides the status retry policy.
    pub fn with_write_retry(mut self, write_retry: WriteRetry) -> Self {
        self.write_retry = write_retry;
        self
    }

    /// Validates and enqueues a batch download.
    ///
    /// The `queued` status record is written before the job is enqueued so
    /// it is readable as soon as this returns.
    pub async fn submit(&self, request: SubmitRequest) -> AppResult<SubmitResponse> {
        request.validate()?;

        let mut job = DownloadJob::new(request.file_ids);
        job.user_id = request.user_id;
        job.webhook_url = request.webhook_url;

        let total = job.total_files();
        let files: Vec<FileStatus> = job.file_ids.iter().copied().map(FileStatus::queued).collect();
        let patch = StatusPatch::new()
            .stage(JobStage::Queued)
            .progress(Progress::start(total))
            .files(files)
            .created_at(Utc::now());

        self.write_retry
            .run("status write", || self.store.upsert(&job.job_id, patch.clone()))
            .await?;

        if let Err(e) = self.queue.submit(&job.job_id, &job).await {
            self.record_enqueue_failure(&job.job_id, &e).await;
            return Err(e);
        }

        tracing::info!(
            "Job {} queued: {} file(s), user={:?}",
            job.job_id,
            total,
            job.user_id
        );

        Ok(SubmitResponse {
            job_id: job.job_id,
            status: JobStage::Queued,
            message: format!("Batch download of {total} file(s) queued"),
        })
    }

    async fn record_enqueue_failure(&self, job_id: &str, error: &AppError) {
        let patch = StatusPatch {
            status: Some(JobStage::Failed),
            completed_at: Some(Some(Utc::now())),
            error: Some(Some(format!("Failed to enqueue job: {}", error.message))),
            ..StatusPatch::default()
        };
        let written = self
            .write_retry
            .run("status write", || self.store.upsert(job_id, patch.clone()))
            .await;
        if let Err(e) = written {
            tracing::error!("Failed to record enqueue failure for job {}: {}", job_id, e);
        }
    }

    /// Returns the status record of a job.
    ///
    /// Transient store errors are retried; a reader sees the record or
    /// `NotFound`.
    pub async fn get_status(&self, job_id: &str) -> AppResult<JobStatus> {
        self.write_retry
            .run("status read", || self.store.get(job_id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Job '{job_id}' not found")))
    }

    /// Returns every live status record, oldest first.
    pub async fn list_all(&self) -> AppResult<Vec<JobStatus>> {
        self.write_retry
            .run("status scan", || self.store.list_all())
            .await
    }

    /// Returns queue statistics.
    pub async fn queue_stats(&self) -> AppResult<QueueStats> {
        self.queue.stats().await
    }
}
