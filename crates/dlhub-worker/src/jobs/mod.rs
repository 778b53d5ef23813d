//! Job handler implementations.

pub mod download;
pub mod fetch;

pub use download::BatchDownloadHandler;
pub use fetch::{SimulatedFetcher, UnitOfWork};
