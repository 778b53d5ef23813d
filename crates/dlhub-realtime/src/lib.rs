//! # dlhub-realtime
//!
//! Subscriber bookkeeping and progress fan-out for DLHub:
//!
//! - **registry**: per-job subscriber sets with idle expiry (in-memory or Redis)
//! - **notifier**: delivery of progress events to one subscriber
//!   (in-process broadcast or Redis pub/sub)
//! - **fanout**: registry + notifier, used by workers after every status write
//!
//! The push transport itself (WebSocket, SSE, ...) lives outside this crate
//! and consumes the notifier's output.

pub mod fanout;
pub mod notifier;
pub mod registry;

pub use fanout::ProgressFanout;
pub use notifier::{BroadcastNotifier, Delivery};
pub use registry::MemoryConnectionRegistry;
