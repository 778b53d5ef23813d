//! In-process notifier for single-node deployments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use dlhub_core::result::AppResult;
use dlhub_core::traits::ProgressNotifier;
use dlhub_entity::ProgressEvent;

/// One event addressed to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    /// Recipient.
    pub subscriber_id: String,
    /// Event payload.
    pub event: ProgressEvent,
}

/// Publishes deliveries on a tokio broadcast channel.
///
/// A transport layer calls [`BroadcastNotifier::subscribe`] and forwards each
/// delivery to the matching client connection.
#[derive(Debug)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Delivery>,
}

impl BroadcastNotifier {
    /// Create a notifier with the given channel buffer size.
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    /// Attach a receiver of every future delivery.
    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl ProgressNotifier for BroadcastNotifier {
    async fn notify(&self, subscriber_id: &str, event: &ProgressEvent) -> AppResult<()> {
        let delivery = Delivery {
            subscriber_id: subscriber_id.to_string(),
            event: event.clone(),
        };
        if self.tx.send(delivery).is_err() {
            trace!(subscriber_id, "No transport attached, delivery dropped");
        }
        Ok(())
    }
}
