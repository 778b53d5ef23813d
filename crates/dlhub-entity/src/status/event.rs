//! Progress events delivered to subscribers.

use serde::{Deserialize, Serialize};

use super::model::{FileStatus, JobStatus};
use super::progress::Progress;
use super::stage::JobStage;

/// Snapshot pushed to every subscriber of a job after a persisted change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Job identifier.
    pub job_id: String,
    /// Lifecycle stage at the time of the event.
    pub status: JobStage,
    /// Progress counters.
    pub progress: Progress,
    /// Per-file entries.
    pub files: Vec<FileStatus>,
    /// Completion artifact reference.
    pub download_url: Option<String>,
    /// Failure description.
    pub error: Option<String>,
}

impl From<&JobStatus> for ProgressEvent {
    fn from(status: &JobStatus) -> Self {
        Self {
            job_id: status.job_id.clone(),
            status: status.status,
            progress: status.progress,
            files: status.files.clone(),
            download_url: status.download_url.clone(),
            error: status.error.clone(),
        }
    }
}
