//! Redis status store and shared connection management.

pub mod client;
pub mod status;

pub use client::RedisClient;
pub use status::RedisStatusStore;
