//! Job status record as persisted in the status store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::progress::Progress;
use super::stage::{FileStage, JobStage};

/// Per-file progress entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    /// File identifier.
    pub file_id: i64,
    /// Current stage.
    pub status: FileStage,
    /// Size in bytes, known once the file completed.
    pub size_bytes: Option<u64>,
}

impl FileStatus {
    /// A file that has not been started.
    pub fn queued(file_id: i64) -> Self {
        Self {
            file_id,
            status: FileStage::Queued,
            size_bytes: None,
        }
    }

    /// Mark the unit of work as in flight.
    pub fn start(&mut self) {
        self.status = FileStage::Processing;
        self.size_bytes = None;
    }

    /// Mark the file as retrieved.
    pub fn complete(&mut self, size_bytes: u64) {
        self.status = FileStage::Completed;
        self.size_bytes = Some(size_bytes);
    }

    /// Mark the file as failed.
    pub fn fail(&mut self) {
        self.status = FileStage::Failed;
        self.size_bytes = None;
    }

    /// Whether the file finished successfully.
    pub fn is_completed(&self) -> bool {
        self.status == FileStage::Completed
    }
}

/// Durable status record for one job.
///
/// Serialized field names match the persisted record shape:
/// `{jobId, status, progress, files, createdAt, updatedAt, completedAt, downloadUrl, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// Job identifier.
    pub job_id: String,
    /// Lifecycle stage.
    pub status: JobStage,
    /// Finished / total counters.
    #[serde(default)]
    pub progress: Progress,
    /// One entry per submitted file id, in submission order.
    #[serde(default)]
    pub files: Vec<FileStatus>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
    /// When the job reached a terminal stage.
    pub completed_at: Option<DateTime<Utc>>,
    /// Completion artifact reference; set only when completed.
    pub download_url: Option<String>,
    /// Human-readable failure description.
    pub error: Option<String>,
}

impl JobStatus {
    /// A fresh record with every optional field at its default.
    pub fn empty(job_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStage::Queued,
            progress: Progress::default(),
            files: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            download_url: None,
            error: None,
        }
    }

    /// Whether the job has reached a terminal stage.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// File ids in recorded order.
    pub fn file_ids(&self) -> Vec<i64> {
        self.files.iter().map(|f| f.file_id).collect()
    }

    /// Number of leading files that completed successfully.
    pub fn completed_prefix(&self) -> usize {
        self.files.iter().take_while(|f| f.is_completed()).count()
    }
}
