//! Batch download job handler.
//!
//! Drives one [`DownloadJob`] through its files in submission order,
//! persisting a full status snapshot and notifying subscribers after each
//! step. A redelivered job resumes after the last file the status record
//! shows as completed, so stored progress never moves backwards.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use dlhub_core::config::AppConfig;
use dlhub_core::error::{AppError, ErrorKind};
use dlhub_core::result::AppResult;
use dlhub_core::retry::WriteRetry;
use dlhub_core::traits::StatusStore;
use dlhub_entity::{
    DownloadJob, Envelope, FileStatus, JobStage, JobStatus, Progress, ProgressEvent, StatusPatch,
};
use dlhub_realtime::ProgressFanout;

use super::fetch::UnitOfWork;
use crate::executor::{JobExecutionError, JobHandler};
use crate::webhook::CompletionWebhook;

/// Job type name for batch downloads.
pub const JOB_TYPE: &str = "batch_download";

/// Processes batch download jobs.
#[derive(Debug)]
pub struct BatchDownloadHandler {
    /// Status store
    store: Arc<dyn StatusStore>,
    /// Subscriber notification
    fanout: ProgressFanout,
    /// Per-file work
    fetcher: Arc<dyn UnitOfWork>,
    /// Completion callback client
    webhook: Option<CompletionWebhook>,
    /// Retry policy for status writes
    write_retry: WriteRetry,
    /// Base of generated download links
    download_base_url: String,
}

impl BatchDownloadHandler {
    /// Create a new batch download handler
    pub fn new(
        store: Arc<dyn StatusStore>,
        fanout: ProgressFanout,
        fetcher: Arc<dyn UnitOfWork>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            fanout,
            fetcher,
            webhook: None,
            write_retry: WriteRetry::from_config(&config.worker),
            download_base_url: config.status.download_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Deliver completion callbacks through `webhook`
    pub fn with_webhook(mut self, webhook: CompletionWebhook) -> Self {
        self.webhook = Some(webhook);
        self
    }

    fn download_url(&self, job_id: &str) -> String {
        format!(
            "{}/{}/download?token={}",
            self.download_base_url,
            job_id,
            Uuid::new_v4()
        )
    }

    async fn read(&self, job_id: &str) -> AppResult<Option<JobStatus>> {
        self.write_retry
            .run("status read", || self.store.get(job_id))
            .await
    }

    /// Write `record` as a full snapshot and return what the store holds.
    async fn persist(&self, record: &JobStatus) -> AppResult<JobStatus> {
        let patch = StatusPatch::snapshot(record);
        self.write_retry
            .run("status write", || self.store.upsert(&record.job_id, patch.clone()))
            .await
    }

    /// Persist and then notify subscribers.
    async fn persist_and_publish(&self, record: &JobStatus) -> AppResult<JobStatus> {
        let stored = self.persist(record).await?;
        self.fanout.publish(&ProgressEvent::from(&stored)).await;
        Ok(stored)
    }

    /// Build the `processing` record for this attempt, keeping any files
    /// a previous attempt already completed.
    fn begin(&self, job: &DownloadJob, existing: Option<JobStatus>) -> JobStatus {
        let now = Utc::now();
        let mut record = existing.unwrap_or_else(|| JobStatus::empty(&job.job_id, now));

        let resumable = record.status == JobStage::Processing && record.file_ids() == job.file_ids;
        let kept = if resumable { record.completed_prefix() } else { 0 };

        let mut files: Vec<FileStatus> = record.files.drain(..kept).collect();
        files.extend(job.file_ids[kept..].iter().map(|id| FileStatus::queued(*id)));

        record.status = JobStage::Processing;
        record.progress = Progress::new(kept as u32, job.total_files());
        record.files = files;
        record.completed_at = None;
        record.download_url = None;
        record.error = None;
        record
    }

    async fn notify_webhook(&self, job: &DownloadJob, record: &JobStatus) {
        let (Some(webhook), Some(url)) = (&self.webhook, &job.webhook_url) else {
            return;
        };
        if let Err(e) = webhook.deliver(url, record).await {
            tracing::warn!("Webhook for job {} failed: {}", job.job_id, e);
        }
    }
}

#[async_trait]
impl JobHandler for BatchDownloadHandler {
    fn job_type(&self) -> &str {
        JOB_TYPE
    }

    async fn execute(&self, envelope: &Envelope) -> Result<Option<Value>, JobExecutionError> {
        let job: DownloadJob = serde_json::from_value(envelope.payload.clone()).map_err(|e| {
            JobExecutionError::Permanent(format!("Malformed download job payload: {e}"))
        })?;

        let existing = self.read(&job.job_id).await?;
        if let Some(record) = existing.as_ref().filter(|r| r.is_terminal()) {
            tracing::info!(
                "Job {} already {}, skipping redelivery",
                job.job_id,
                record.status
            );
            return Ok(None);
        }

        let total = job.file_ids.len();
        let mut record = self.persist_and_publish(&self.begin(&job, existing)).await?;
        let resume_from = record.completed_prefix();
        tracing::info!(
            "Processing job {}: {} file(s), attempt {}/{}, starting at file #{}",
            job.job_id,
            total,
            envelope.attempts_made,
            envelope.max_attempts,
            resume_from + 1
        );

        for index in resume_from..total {
            let file_id = job.file_ids[index];
            record.files[index].start();
            record = self.persist(&record).await?;

            match self.fetcher.fetch(&job.job_id, file_id).await {
                Ok(size_bytes) => {
                    record.files[index].complete(size_bytes);
                    record.progress = Progress::new(index as u32 + 1, total as u32);
                    record = self.persist_and_publish(&record).await?;
                    tracing::debug!(
                        "Job {}: file {} done ({} bytes), {}%",
                        job.job_id,
                        file_id,
                        size_bytes,
                        record.progress.percentage
                    );
                }
                Err(reason) => {
                    let description = format!("File {file_id} failed: {reason}");
                    record.files[index].fail();
                    record.error = Some(description.clone());
                    if envelope.is_final_attempt() {
                        record.status = JobStage::Failed;
                        record.completed_at = Some(Utc::now());
                    }
                    let stored = self.persist_and_publish(&record).await?;
                    if stored.is_terminal() {
                        tracing::error!("Job {} failed: {}", job.job_id, description);
                        self.notify_webhook(&job, &stored).await;
                    }
                    return Err(JobExecutionError::UnitOfWork(description));
                }
            }
        }

        let download_url = self.download_url(&job.job_id);
        record.status = JobStage::Completed;
        record.progress = Progress::finished(total as u32);
        record.completed_at = Some(Utc::now());
        record.download_url = Some(download_url.clone());
        record.error = None;
        let stored = self.persist_and_publish(&record).await?;

        tracing::info!("Job {} completed: {} file(s)", job.job_id, total);
        self.notify_webhook(&job, &stored).await;
        Ok(Some(json!({ "downloadUrl": download_url })))
    }

    async fn on_exhausted(&self, envelope: &Envelope, error: &AppError) {
        let job_id = serde_json::from_value::<DownloadJob>(envelope.payload.clone())
            .map(|job| job.job_id)
            .unwrap_or_else(|_| envelope.id.clone());

        match self.read(&job_id).await {
            Ok(Some(record)) if record.is_terminal() => {
                tracing::debug!("Job {} already {}", job_id, record.status);
                return;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not read status of job {}: {}", job_id, e),
        }

        let patch = StatusPatch {
            status: Some(JobStage::Failed),
            completed_at: Some(Some(Utc::now())),
            error: Some(Some(error.message.clone())),
            ..StatusPatch::default()
        };
        let stored = match self
            .write_retry
            .run("status write", || self.store.upsert(&job_id, patch.clone()))
            .await
        {
            Ok(stored) => stored,
            Err(e) if e.kind == ErrorKind::Conflict => {
                tracing::debug!("Job {} already terminal: {}", job_id, e);
                return;
            }
            Err(e) => {
                tracing::error!("Failed to mark job {} as failed: {}", job_id, e);
                return;
            }
        };

        tracing::error!(
            "Job {} failed after {} attempt(s) ({}): {}",
            job_id,
            envelope.attempts_made,
            error.kind,
            error.message
        );
        self.fanout.publish(&ProgressEvent::from(&stored)).await;
        if let Ok(job) = serde_json::from_value::<DownloadJob>(envelope.payload.clone()) {
            self.notify_webhook(&job, &stored).await;
        }
    }
}
