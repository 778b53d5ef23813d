//! Lifecycle stage enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stage of a download job.
///
/// Transitions are monotonic: `queued → processing → {completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    /// Accepted and waiting for a worker.
    #[default]
    Queued,
    /// Owned by a worker and making progress.
    Processing,
    /// Every file finished successfully.
    Completed,
    /// Failed after delivery attempts were exhausted.
    Failed,
}

impl JobStage {
    /// Check if the stage is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Whether a record in this stage may move to `next`.
    ///
    /// Re-writing the same stage is allowed so that snapshots can be refreshed.
    /// Nothing leaves a terminal stage.
    pub fn can_transition_to(&self, next: JobStage) -> bool {
        if *self == next {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Return the stage as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored stage string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file stage within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStage {
    /// Not yet started.
    #[default]
    Queued,
    /// Unit of work in flight.
    Processing,
    /// Retrieved successfully.
    Completed,
    /// Retrieval failed.
    Failed,
}

impl FileStage {
    /// Return the stage as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
