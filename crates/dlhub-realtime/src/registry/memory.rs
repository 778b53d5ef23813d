//! In-memory connection registry.

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use dlhub_core::config::RegistryConfig;
use dlhub_core::result::AppResult;
use dlhub_core::traits::ConnectionRegistry;

/// Subscribers of one job plus the instant the set goes idle.
#[derive(Debug)]
struct Membership {
    subscribers: HashSet<String>,
    idle_deadline: Instant,
}

impl Membership {
    fn is_live(&self, now: Instant) -> bool {
        now < self.idle_deadline
    }
}

/// Registry of job subscriptions held in process memory.
///
/// Each job's set expires `idle_ttl` after the last `subscribe`, matching
/// the Redis registry's `EXPIRE` semantics.
#[derive(Debug)]
pub struct MemoryConnectionRegistry {
    /// Job id → membership.
    jobs: DashMap<String, Membership>,
    /// Idle expiry window.
    idle_ttl: Duration,
}

impl MemoryConnectionRegistry {
    /// Creates a new registry from configuration.
    pub fn new(config: &RegistryConfig) -> Self {
        Self::with_idle_ttl(config.idle_ttl())
    }

    /// Creates a registry with an explicit idle window.
    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            jobs: DashMap::new(),
            idle_ttl,
        }
    }

    /// Drops every idle membership. Returns how many job sets were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.jobs.len();
        self.jobs.retain(|_, membership| membership.is_live(now));
        before - self.jobs.len()
    }

    /// Returns the number of jobs with live subscribers.
    pub fn job_count(&self) -> usize {
        let now = Instant::now();
        self.jobs.iter().filter(|m| m.is_live(now)).count()
    }
}

#[async_trait]
impl ConnectionRegistry for MemoryConnectionRegistry {
    async fn subscribe(&self, job_id: &str, subscriber_id: &str) -> AppResult<()> {
        let now = Instant::now();
        let mut membership = self
            .jobs
            .entry(job_id.to_string())
            .or_insert_with(|| Membership {
                subscribers: HashSet::new(),
                idle_deadline: now + self.idle_ttl,
            });

        if !membership.is_live(now) {
            membership.subscribers.clear();
        }
        membership.subscribers.insert(subscriber_id.to_string());
        membership.idle_deadline = now + self.idle_ttl;

        debug!(job_id, subscriber_id, "Subscriber registered");
        Ok(())
    }

    async fn unsubscribe(&self, job_id: &str, subscriber_id: &str) -> AppResult<()> {
        let emptied = match self.jobs.get_mut(job_id) {
            Some(mut membership) => {
                membership.subscribers.remove(subscriber_id);
                membership.subscribers.is_empty()
            }
            None => false,
        };
        // Re-checked under the shard lock; a concurrent subscribe may have refilled the set.
        if emptied {
            self.jobs.remove_if(job_id, |_, m| m.subscribers.is_empty());
        }
        debug!(job_id, subscriber_id, "Subscriber removed");
        Ok(())
    }

    async fn list_subscribers(&self, job_id: &str) -> AppResult<BTreeSet<String>> {
        let now = Instant::now();
        let expired = match self.jobs.get(job_id) {
            Some(membership) if membership.is_live(now) => {
                return Ok(membership.subscribers.iter().cloned().collect());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.jobs.remove_if(job_id, |_, m| !m.is_live(now));
        }
        Ok(BTreeSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_registry() -> MemoryConnectionRegistry {
        MemoryConnectionRegistry::with_idle_ttl(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_subscribe_and_list() {
        let registry = make_registry();
        registry.subscribe("job", "conn-a").await.unwrap();
        registry.subscribe("job", "conn-b").await.unwrap();
        registry.subscribe("other", "conn-c").await.unwrap();

        let subs = registry.list_subscribers("job").await.unwrap();
        assert_eq!(
            subs.into_iter().collect::<Vec<_>>(),
            vec!["conn-a".to_string(), "conn-b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_subscribe_twice_is_idempotent() {
        let registry = make_registry();
        registry.subscribe("job", "conn-a").await.unwrap();
        registry.subscribe("job", "conn-a").await.unwrap();
        assert_eq!(registry.list_subscribers("job").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_member_and_empty_set() {
        let registry = make_registry();
        registry.subscribe("job", "conn-a").await.unwrap();
        registry.subscribe("job", "conn-b").await.unwrap();

        registry.unsubscribe("job", "conn-a").await.unwrap();
        let subs = registry.list_subscribers("job").await.unwrap();
        assert!(subs.contains("conn-b"));
        assert!(!subs.contains("conn-a"));

        registry.unsubscribe("job", "conn-b").await.unwrap();
        assert_eq!(registry.job_count(), 0);

        registry.unsubscribe("job", "never-there").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_unsubscribe_never_drops_concurrent_subscriber() {
        let registry = std::sync::Arc::new(make_registry());
        for round in 0..200 {
            registry.subscribe("job", "leaving").await.unwrap();
            let joiner = format!("joining-{round}");

            let leave = {
                let registry = registry.clone();
                tokio::spawn(async move { registry.unsubscribe("job", "leaving").await })
            };
            let join = {
                let registry = registry.clone();
                let joiner = joiner.clone();
                tokio::spawn(async move { registry.subscribe("job", &joiner).await })
            };
            leave.await.unwrap().unwrap();
            join.await.unwrap().unwrap();

            let subs = registry.list_subscribers("job").await.unwrap();
            assert!(subs.contains(&joiner), "round {round} lost {joiner}");
            registry.unsubscribe("job", &joiner).await.unwrap();
        }
        assert_eq!(registry.job_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_membership_expires_when_idle() {
        let registry = make_registry();
        registry.subscribe("job", "conn-a").await.unwrap();

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert_eq!(registry.list_subscribers("job").await.unwrap().len(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(registry.list_subscribers("job").await.unwrap().is_empty());
        assert_eq!(registry.job_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_rearms_idle_window() {
        let registry = make_registry();
        registry.subscribe("job", "conn-a").await.unwrap();
        tokio::time::advance(Duration::from_secs(3000)).await;
        registry.subscribe("job", "conn-b").await.unwrap();
        tokio::time::advance(Duration::from_secs(3000)).await;

        let subs = registry.list_subscribers("job").await.unwrap();
        assert_eq!(subs.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let registry = make_registry();
        registry.subscribe("old", "conn-a").await.unwrap();
        tokio::time::advance(Duration::from_secs(3000)).await;
        registry.subscribe("new", "conn-b").await.unwrap();
        tokio::time::advance(Duration::from_secs(700)).await;

        assert_eq!(registry.purge_expired(), 1);
        assert_eq!(registry.job_count(), 1);
    }
}
