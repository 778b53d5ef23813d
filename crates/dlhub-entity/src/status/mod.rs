//! Job status records, progress, and lifecycle stages.

pub mod event;
pub mod model;
pub mod patch;
pub mod progress;
pub mod stage;

pub use event::ProgressEvent;
pub use model::{FileStatus, JobStatus};
pub use patch::{InvalidTransition, StatusPatch};
pub use progress::Progress;
pub use stage::{FileStage, JobStage};
