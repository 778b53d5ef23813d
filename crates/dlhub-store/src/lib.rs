//! # dlhub-store
//!
//! Status store implementations for DLHub. Supports two modes:
//!
//! - **memory**: In-process store using [moka](https://crates.io/crates/moka)
//!   with per-record expiry
//! - **redis**: One Redis hash per job, expired with `EXPIRE`
//!
//! The provider is selected at runtime based on configuration. The Redis
//! client defined here is shared with the queue and the connection registry.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::StatusStoreManager;
