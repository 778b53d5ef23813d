//! Generic queue envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable envelope carrying an opaque job payload through the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Job identifier, unique within a queue.
    pub id: String,
    /// Opaque payload; the queue never interprets it.
    pub payload: serde_json::Value,
    /// Delivery attempts started so far, including the current one.
    pub attempts_made: u32,
    /// Delivery attempt ceiling.
    pub max_attempts: u32,
    /// When the job was accepted.
    pub enqueued_at: DateTime<Utc>,
    /// Error recorded by the most recent failed attempt.
    pub last_error: Option<String>,
}

impl Envelope {
    /// Wrap a payload for first delivery.
    pub fn new(id: impl Into<String>, payload: serde_json::Value, max_attempts: u32) -> Self {
        Self {
            id: id.into(),
            payload,
            attempts_made: 0,
            max_attempts,
            enqueued_at: Utc::now(),
            last_error: None,
        }
    }

    /// Whether the current delivery is the last one the policy allows.
    pub fn is_final_attempt(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }

    /// Whether another delivery may be scheduled.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts_made < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_accounting() {
        let mut env = Envelope::new("a", serde_json::json!({}), 3);
        assert!(env.has_attempts_left());
        env.attempts_made = 2;
        assert!(!env.is_final_attempt());
        env.attempts_made = 3;
        assert!(env.is_final_attempt());
        assert!(!env.has_attempts_left());
    }
}
