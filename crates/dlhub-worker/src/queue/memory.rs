//! In-process queue backend.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use dlhub_core::result::AppResult;
use dlhub_core::traits::{QueueBackend, QueueStats, RetentionPolicy};
use dlhub_entity::Envelope;

#[derive(Debug, Default)]
struct QueueState {
    jobs: HashMap<String, Envelope>,
    wait: VecDeque<String>,
    /// (ready at, insertion sequence, id)
    delayed: Vec<(Instant, u64, String)>,
    /// id → lease deadline
    active: HashMap<String, Instant>,
    completed: VecDeque<(Instant, String)>,
    failed: VecDeque<(Instant, String)>,
    sequence: u64,
}

impl QueueState {
    fn promote_due(&mut self, now: Instant) {
        if self.delayed.is_empty() {
            return;
        }
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.delayed.drain(..).partition(|(ready, _, _)| *ready <= now);
        self.delayed = pending;
        due.sort_by_key(|(ready, seq, _)| (*ready, *seq));
        self.wait.extend(due.into_iter().map(|(_, _, id)| id));
    }

    fn forget(&mut self, id: &str) {
        self.jobs.remove(id);
    }
}

/// Queue backend holding all state in process memory.
///
/// Nothing survives a restart; use the Redis backend for durability.
#[derive(Debug, Default)]
pub struct MemoryQueueBackend {
    state: Mutex<QueueState>,
}

impl MemoryQueueBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueueBackend {
    async fn push(&self, envelope: Envelope) -> AppResult<bool> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.jobs.contains_key(&envelope.id) {
            return Ok(false);
        }
        state.wait.push_back(envelope.id.clone());
        state.jobs.insert(envelope.id.clone(), envelope);
        Ok(true)
    }

    async fn claim(&self, lease: Duration) -> AppResult<Option<Envelope>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = Instant::now();
        state.promote_due(now);

        while let Some(id) = state.wait.pop_front() {
            let Some(envelope) = state.jobs.get_mut(&id) else {
                continue;
            };
            envelope.attempts_made += 1;
            let claimed = envelope.clone();
            state.active.insert(id, now + lease);
            return Ok(Some(claimed));
        }
        Ok(None)
    }

    async fn extend_lease(&self, id: &str, lease: Duration) -> AppResult<bool> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        match state.active.get_mut(id) {
            Some(deadline) => {
                *deadline = Instant::now() + lease;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete(&self, id: &str) -> AppResult<bool> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.active.remove(id).is_none() {
            return Ok(false);
        }
        state.completed.push_back((Instant::now(), id.to_string()));
        Ok(true)
    }

    async fn retry_after(&self, id: &str, delay: Duration, error: &str) -> AppResult<bool> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.active.remove(id).is_none() {
            return Ok(false);
        }
        if let Some(envelope) = state.jobs.get_mut(id) {
            envelope.last_error = Some(error.to_string());
        }
        state.sequence += 1;
        let seq = state.sequence;
        state.delayed.push((Instant::now() + delay, seq, id.to_string()));
        Ok(true)
    }

    async fn fail(&self, id: &str, error: &str) -> AppResult<bool> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.active.remove(id).is_none() {
            return Ok(false);
        }
        if let Some(envelope) = state.jobs.get_mut(id) {
            envelope.last_error = Some(error.to_string());
        }
        state.failed.push_back((Instant::now(), id.to_string()));
        Ok(true)
    }

    async fn recover_stalled(&self) -> AppResult<Vec<Envelope>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = Instant::now();

        let mut expired: Vec<(Instant, String)> = state
            .active
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (*deadline, id.clone()))
            .collect();
        expired.sort();

        let mut exhausted = Vec::new();
        for (_, id) in expired {
            state.active.remove(&id);
            let Some(envelope) = state.jobs.get_mut(&id) else {
                continue;
            };
            if envelope.has_attempts_left() {
                state.wait.push_back(id);
            } else {
                envelope.last_error = Some(format!(
                    "Lease expired after {} attempts",
                    envelope.attempts_made
                ));
                exhausted.push(envelope.clone());
                state.failed.push_back((now, id));
            }
        }
        Ok(exhausted)
    }

    async fn purge(&self, policy: &RetentionPolicy) -> AppResult<u64> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = Instant::now();
        let mut removed = 0;

        while let Some((finished, _)) = state.completed.front() {
            let too_old = now.duration_since(*finished) > policy.completed_age;
            if !too_old && state.completed.len() <= policy.completed_count {
                break;
            }
            if let Some((_, id)) = state.completed.pop_front() {
                state.forget(&id);
                removed += 1;
            }
        }

        while let Some((finished, _)) = state.failed.front() {
            if now.duration_since(*finished) <= policy.failed_age {
                break;
            }
            if let Some((_, id)) = state.failed.pop_front() {
                state.forget(&id);
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn stats(&self) -> AppResult<QueueStats> {
        let state = self.state.lock().await;
        Ok(QueueStats {
            waiting: state.wait.len() as u64,
            delayed: state.delayed.len() as u64,
            active: state.active.len() as u64,
            completed: state.completed.len() as u64,
            failed: state.failed.len() as u64,
        })
    }

    async fn get(&self, id: &str) -> AppResult<Option<Envelope>> {
        Ok(self.state.lock().await.jobs.get(id).cloned())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
