//! Key builders for every Redis entry DLHub writes.
//!
//! Keys are relative; [`crate::redis::RedisClient::prefixed_key`] applies
//! the configured prefix.

// ── Status keys ────────────────────────────────────────────

/// Hash holding the status record of a job.
pub fn job_status(job_id: &str) -> String {
    format!("job:{job_id}")
}

/// Pattern matching every status record.
pub fn job_status_pattern() -> String {
    "job:*".to_string()
}

// ── Registry keys ──────────────────────────────────────────

/// Set of subscriber ids interested in a job.
pub fn job_subscribers(job_id: &str) -> String {
    format!("ws:job:{job_id}")
}

/// Pub/sub channel delivering progress events to one subscriber.
pub fn subscriber_channel(subscriber_id: &str) -> String {
    format!("notify:{subscriber_id}")
}

// ── Queue keys ─────────────────────────────────────────────

/// Hash of job id → serialized envelope.
pub fn queue_jobs(queue: &str) -> String {
    format!("queue:{queue}:jobs")
}

/// Hash of job id → delivery attempts made.
pub fn queue_attempts(queue: &str) -> String {
    format!("queue:{queue}:attempts")
}

/// Hash of job id → last recorded error.
pub fn queue_errors(queue: &str) -> String {
    format!("queue:{queue}:errors")
}

/// List of job ids ready to be claimed.
pub fn queue_wait(queue: &str) -> String {
    format!("queue:{queue}:wait")
}

/// Sorted set of job ids scored by the time they become ready.
pub fn queue_delayed(queue: &str) -> String {
    format!("queue:{queue}:delayed")
}

/// Sorted set of claimed job ids scored by lease deadline.
pub fn queue_active(queue: &str) -> String {
    format!("queue:{queue}:active")
}

/// Sorted set of completed job ids scored by finish time.
pub fn queue_completed(queue: &str) -> String {
    format!("queue:{queue}:completed")
}

/// Sorted set of failed job ids scored by finish time.
pub fn queue_failed(queue: &str) -> String {
    format!("queue:{queue}:failed")
}
