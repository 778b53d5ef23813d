//! Partial status updates merged into existing records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{FileStatus, JobStatus};
use super::progress::Progress;
use super::stage::JobStage;

/// A rejected stage change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stage transition for job '{job_id}': {from} -> {to}")]
pub struct InvalidTransition {
    /// Job whose record would have changed.
    pub job_id: String,
    /// Stage currently stored.
    pub from: JobStage,
    /// Stage requested by the patch.
    pub to: JobStage,
}

/// Fields to merge into a status record. `None` leaves a field untouched.
///
/// Nullable record fields use a nested `Option` so a patch can clear them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusPatch {
    /// New lifecycle stage.
    pub status: Option<JobStage>,
    /// New progress counters.
    pub progress: Option<Progress>,
    /// Full replacement of the file list.
    pub files: Option<Vec<FileStatus>>,
    /// Creation timestamp, normally set only by the submitter.
    pub created_at: Option<DateTime<Utc>>,
    /// Terminal timestamp.
    pub completed_at: Option<Option<DateTime<Utc>>>,
    /// Completion artifact reference.
    pub download_url: Option<Option<String>>,
    /// Failure description.
    pub error: Option<Option<String>>,
}

impl StatusPatch {
    /// Start an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Full snapshot of a record, as the worker writes after every step.
    pub fn snapshot(status: &JobStatus) -> Self {
        Self {
            status: Some(status.status),
            progress: Some(status.progress),
            files: Some(status.files.clone()),
            created_at: None,
            completed_at: Some(status.completed_at),
            download_url: Some(status.download_url.clone()),
            error: Some(status.error.clone()),
        }
    }

    /// Set the stage.
    pub fn stage(mut self, stage: JobStage) -> Self {
        self.status = Some(stage);
        self
    }

    /// Set the progress counters.
    pub fn progress(mut self, progress: Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Replace the file list.
    pub fn files(mut self, files: Vec<FileStatus>) -> Self {
        self.files = Some(files);
        self
    }

    /// Set the creation timestamp.
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Set or clear the error description.
    pub fn error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    /// Merge this patch into `current` (or a fresh record) and stamp `updated_at`.
    pub fn apply(
        self,
        job_id: &str,
        current: Option<JobStatus>,
        now: DateTime<Utc>,
    ) -> Result<JobStatus, InvalidTransition> {
        let mut record = current.unwrap_or_else(|| JobStatus::empty(job_id, now));

        if let Some(next) = self.status {
            if !record.status.can_transition_to(next) {
                return Err(InvalidTransition {
                    job_id: job_id.to_string(),
                    from: record.status,
                    to: next,
                });
            }
            record.status = next;
        }
        if let Some(progress) = self.progress {
            record.progress = progress;
        }
        if let Some(files) = self.files {
            record.files = files;
        }
        if let Some(created_at) = self.created_at {
            record.created_at = created_at;
        }
        if let Some(completed_at) = self.completed_at {
            record.completed_at = completed_at;
        }
        if let Some(download_url) = self.download_url {
            record.download_url = download_url;
        }
        if let Some(error) = self.error {
            record.error = error;
        }

        record.job_id = job_id.to_string();
        record.updated_at = now;
        Ok(record)
    }
}
