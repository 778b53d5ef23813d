//! Completion webhook delivery.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use dlhub_core::error::{AppError, ErrorKind};
use dlhub_core::result::AppResult;
use dlhub_entity::{JobStage, JobStatus};

/// Body POSTed to a job's webhook URL once the job reaches a terminal state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// Job identifier
    pub job_id: String,
    /// Terminal stage
    pub status: JobStage,
    /// Files in the job
    pub total_files: u32,
    /// Files downloaded
    pub completed_files: u32,
    /// Download link when completed
    pub download_url: Option<String>,
    /// Failure description when failed
    pub error: Option<String>,
    /// When the job reached its terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&JobStatus> for WebhookPayload {
    fn from(record: &JobStatus) -> Self {
        Self {
            job_id: record.job_id.clone(),
            status: record.status,
            total_files: record.progress.total,
            completed_files: record.progress.current,
            download_url: record.download_url.clone(),
            error: record.error.clone(),
            completed_at: record.completed_at,
        }
    }
}

/// HTTP client for completion webhooks.
#[derive(Debug, Clone)]
pub struct CompletionWebhook {
    client: reqwest::Client,
}

impl CompletionWebhook {
    /// Create a webhook client with the given request timeout.
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Failed to build webhook client: {e}"),
                    e,
                )
            })?;
        Ok(Self { client })
    }

    /// POST the terminal status of `record` to `url`.
    pub async fn deliver(&self, url: &str, record: &JobStatus) -> AppResult<()> {
        let payload = WebhookPayload::from(record);
        self.client
            .post(url)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::ExternalService,
                    format!("Webhook delivery to {url} failed: {e}"),
                    e,
                )
            })?;

        tracing::info!(
            "Webhook delivered: job_id={}, status={}, url={}",
            record.job_id,
            record.status,
            url
        );
        Ok(())
    }
}
