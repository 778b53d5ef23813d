//! # dlhub-core
//!
//! Core crate for DLHub. Contains the backend traits (status store,
//! connection registry, progress notifier, queue backend), the
//! configuration schema, and the unified error system.

pub mod config;
pub mod error;
pub mod result;
pub mod retry;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
