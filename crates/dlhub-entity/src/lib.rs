//! # dlhub-entity
//!
//! Domain entities shared by every DLHub crate: the batch download job
//! submitted by producers, the per-job status record kept in the status
//! store, the progress events pushed to subscribers, and the generic
//! queue envelope.
//!
//! This crate has no internal dependencies on other DLHub crates.

pub mod job;
pub mod queue;
pub mod status;

pub use job::DownloadJob;
pub use queue::Envelope;
pub use status::{
    FileStage, FileStatus, InvalidTransition, JobStage, JobStatus, Progress, ProgressEvent,
    StatusPatch,
};
