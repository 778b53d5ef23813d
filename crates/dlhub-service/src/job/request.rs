//! Submission request and response types.

use serde::{Deserialize, Serialize};

use dlhub_core::error::AppError;
use dlhub_core::result::AppResult;
use dlhub_entity::JobStage;

/// A batch download request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Ordered file ids; at least one.
    pub file_ids: Vec<i64>,
    /// Requester identity.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Completion callback target.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl SubmitRequest {
    /// Request a batch of files.
    pub fn new(file_ids: Vec<i64>) -> Self {
        Self {
            file_ids,
            ..Self::default()
        }
    }

    /// Reject requests that must never reach the queue.
    pub fn validate(&self) -> AppResult<()> {
        if self.file_ids.is_empty() {
            return Err(AppError::validation(
                "fileIds must contain at least one file id",
            ));
        }
        if let Some(url) = &self.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AppError::validation(format!(
                    "webhookUrl must be an http(s) URL, got '{url}'"
                )));
            }
        }
        Ok(())
    }
}

/// Acknowledgement of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// Identifier to poll or subscribe with.
    pub job_id: String,
    /// Stage at acceptance, always `queued`.
    pub status: JobStage,
    /// Human-readable summary.
    pub message: String,
}
