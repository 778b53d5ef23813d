//! Batch download submission and status reads.

pub mod request;
pub mod service;

pub use request::{SubmitRequest, SubmitResponse};
pub use service::DownloadService;
