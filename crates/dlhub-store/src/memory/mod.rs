//! In-memory status store.

pub mod store;

pub use store::MemoryStatusStore;
