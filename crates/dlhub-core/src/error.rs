//! Unified application error types for DLHub.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

use dlhub_entity::InvalidTransition;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested job or record was not found (or has expired).
    NotFound,
    /// A submission was malformed and was rejected before enqueueing.
    Validation,
    /// A write conflicted with the stored state (duplicate id, illegal stage change).
    Conflict,
    /// The status store backend failed.
    Store,
    /// The queue backend failed.
    Queue,
    /// The connection registry or notifier backend failed.
    Registry,
    /// A per-file unit of work failed.
    UnitOfWork,
    /// The queue redelivered a job up to its attempt ceiling without success.
    DeliveryExhausted,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An external service (completion callback) failed.
    ExternalService,
    /// An internal error occurred.
    Internal,
}

impl ErrorKind {
    /// Whether errors of this kind are infrastructure blips worth retrying locally.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store | Self::Queue | Self::Registry)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Store => write!(f, "STORE"),
            Self::Queue => write!(f, "QUEUE"),
            Self::Registry => write!(f, "REGISTRY"),
            Self::UnitOfWork => write!(f, "UNIT_OF_WORK"),
            Self::DeliveryExhausted => write!(f, "DELIVERY_EXHAUSTED"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::ExternalService => write!(f, "EXTERNAL_SERVICE"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified application error used throughout DLHub.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a status store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Store, message)
    }

    /// Create a unit-of-work error.
    pub fn unit_of_work(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnitOfWork, message)
    }

    /// Create a delivery-exhausted error.
    pub fn delivery_exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DeliveryExhausted, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Whether a local retry may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        Self::with_source(ErrorKind::Conflict, err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind() {
        let err = AppError::validation("fileIds must not be empty");
        assert_eq!(err.to_string(), "VALIDATION: fileIds must not be empty");
    }

    #[test]
    fn test_transient_kinds() {
        assert!(AppError::store("blip").is_transient());
        assert!(AppError::new(ErrorKind::Queue, "blip").is_transient());
        assert!(!AppError::unit_of_work("bad file").is_transient());
        assert!(!AppError::not_found("gone").is_transient());
    }

    #[test]
    fn test_invalid_transition_maps_to_conflict() {
        let err: AppError = InvalidTransition {
            job_id: "j".into(),
            from: dlhub_entity::JobStage::Completed,
            to: dlhub_entity::JobStage::Processing,
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }
}
