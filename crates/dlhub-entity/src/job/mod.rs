//! Batch download job entities.

pub mod model;

pub use model::DownloadJob;
