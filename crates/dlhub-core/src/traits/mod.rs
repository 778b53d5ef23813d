//! Backend traits shared across DLHub crates.

pub mod queue;
pub mod registry;
pub mod status_store;

pub use queue::{QueueBackend, QueueStats, RetentionPolicy};
pub use registry::{ConnectionRegistry, ProgressNotifier};
pub use status_store::StatusStore;
