//! Progress subscriptions.

pub mod service;

pub use service::SubscriptionService;
