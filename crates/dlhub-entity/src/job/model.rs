//! Download job model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One batch download request spanning one or more file ids.
///
/// Immutable once enqueued; the queue carries it as an opaque JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadJob {
    /// Unique job identifier.
    pub job_id: String,
    /// Ordered file identifiers. Duplicates are permitted.
    pub file_ids: Vec<i64>,
    /// Optional requester identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Optional completion callback target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl DownloadJob {
    /// Create a job with a freshly generated id.
    pub fn new(file_ids: Vec<i64>) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            file_ids,
            user_id: None,
            webhook_url: None,
        }
    }

    /// Attach a requester identity.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach a completion callback target.
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    /// Number of files in the batch.
    pub fn total_files(&self) -> u32 {
        self.file_ids.len() as u32
    }
}
