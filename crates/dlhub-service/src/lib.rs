//! # dlhub-service
//!
//! Service layer for DLHub. Producers submit batch downloads through
//! [`DownloadService`]; observers read status records and register
//! interest in progress through [`SubscriptionService`].
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod job;
pub mod subscription;

pub use job::{DownloadService, SubmitRequest, SubmitResponse};
pub use subscription::SubscriptionService;
