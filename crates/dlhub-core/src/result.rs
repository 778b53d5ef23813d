//! Convenience result type alias for DLHub.

use crate::error::AppError;

/// A specialized `Result` type for DLHub operations.
pub type AppResult<T> = Result<T, AppError>;
