//! Redis queue backend.
//!
//! Layout per queue (all keys prefixed):
//! - `jobs` hash: id → serialized envelope as enqueued
//! - `attempts` / `errors` hashes: delivery counters and last error
//! - `wait` list, `delayed` / `active` / `completed` / `failed` sorted sets
//!
//! Every transition between sets runs as a single Lua script, so a job is
//! always in exactly one of them even if the connection drops mid-call.
//! Removal from `active` is the ownership check when settling.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use tracing::debug;

use dlhub_core::error::{AppError, ErrorKind};
use dlhub_core::result::AppResult;
use dlhub_core::traits::{QueueBackend, QueueStats, RetentionPolicy};
use dlhub_entity::Envelope;
use dlhub_store::keys;
use dlhub_store::redis::RedisClient;

/// KEYS: wait, delayed, active, jobs, attempts, errors
/// ARGV: now (ms), lease deadline (ms)
const CLAIM_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for _, id in ipairs(due) do
  redis.call('ZREM', KEYS[2], id)
  redis.call('RPUSH', KEYS[1], id)
end
while true do
  local id = redis.call('LPOP', KEYS[1])
  if not id then
    return false
  end
  local raw = redis.call('HGET', KEYS[4], id)
  if raw then
    local attempts = redis.call('HINCRBY', KEYS[5], id, 1)
    redis.call('ZADD', KEYS[3], ARGV[2], id)
    local err = redis.call('HGET', KEYS[6], id)
    return {raw, attempts, err}
  end
end
"#;

/// KEYS: jobs, wait
/// ARGV: id, serialized envelope
const PUSH_SCRIPT: &str = r#"
if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2]) == 0 then
  return 0
end
redis.call('RPUSH', KEYS[2], ARGV[1])
return 1
"#;

/// KEYS: active
/// ARGV: id, new deadline (ms)
const EXTEND_SCRIPT: &str = r#"
if not redis.call('ZSCORE', KEYS[1], ARGV[1]) then
  return 0
end
redis.call('ZADD', KEYS[1], ARGV[2], ARGV[1])
return 1
"#;

/// Move a leased job from `active` into a finished or delayed set.
///
/// KEYS: active, target, errors
/// ARGV: id, score, [error]
const SETTLE_SCRIPT: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 0 then
  return 0
end
if ARGV[3] then
  redis.call('HSET', KEYS[3], ARGV[1], ARGV[3])
end
redis.call('ZADD', KEYS[2], ARGV[2], ARGV[1])
return 1
"#;

/// Requeue or fail one job whose lease deadline has passed.
///
/// KEYS: active, wait, failed, errors, attempts
/// ARGV: id, now (ms), max attempts
/// Returns {0, nil} when the lease is no longer expired, {1, nil} when
/// requeued, {2, reason} when moved to `failed`.
const RECOVER_SCRIPT: &str = r#"
local deadline = redis.call('ZSCORE', KEYS[1], ARGV[1])
if not deadline or tonumber(deadline) > tonumber(ARGV[2]) then
  return {0, false}
end
redis.call('ZREM', KEYS[1], ARGV[1])
local attempts = tonumber(redis.call('HGET', KEYS[5], ARGV[1]) or '0')
if attempts < tonumber(ARGV[3]) then
  redis.call('RPUSH', KEYS[2], ARGV[1])
  return {1, false}
end
local reason = 'Lease expired after ' .. attempts .. ' attempts'
redis.call('HSET', KEYS[4], ARGV[1], reason)
redis.call('ZADD', KEYS[3], ARGV[2], ARGV[1])
return {2, reason}
"#;

#[derive(Debug, Clone)]
struct QueueKeys {
    jobs: String,
    attempts: String,
    errors: String,
    wait: String,
    delayed: String,
    active: String,
    completed: String,
    failed: String,
}

impl QueueKeys {
    fn new(client: &RedisClient, queue: &str) -> Self {
        Self {
            jobs: client.prefixed_key(&keys::queue_jobs(queue)),
            attempts: client.prefixed_key(&keys::queue_attempts(queue)),
            errors: client.prefixed_key(&keys::queue_errors(queue)),
            wait: client.prefixed_key(&keys::queue_wait(queue)),
            delayed: client.prefixed_key(&keys::queue_delayed(queue)),
            active: client.prefixed_key(&keys::queue_active(queue)),
            completed: client.prefixed_key(&keys::queue_completed(queue)),
            failed: client.prefixed_key(&keys::queue_failed(queue)),
        }
    }
}

/// Durable queue backend on Redis.
#[derive(Debug, Clone)]
pub struct RedisQueueBackend {
    client: RedisClient,
    keys: QueueKeys,
    push_script: redis::Script,
    claim_script: redis::Script,
    extend_script: redis::Script,
    settle_script: redis::Script,
    recover_script: redis::Script,
}

impl RedisQueueBackend {
    /// Create a backend for the named queue.
    pub fn new(client: RedisClient, queue: &str) -> Self {
        let keys = QueueKeys::new(&client, queue);
        Self {
            client,
            keys,
            push_script: redis::Script::new(PUSH_SCRIPT),
            claim_script: redis::Script::new(CLAIM_SCRIPT),
            extend_script: redis::Script::new(EXTEND_SCRIPT),
            settle_script: redis::Script::new(SETTLE_SCRIPT),
            recover_script: redis::Script::new(RECOVER_SCRIPT),
        }
    }

    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Queue, format!("Redis queue error: {e}"), e)
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn deadline_ms(after: Duration) -> i64 {
        Self::now_ms().saturating_add(after.as_millis().min(i64::MAX as u128) as i64)
    }

    /// Move `id` out of `active` into `target`, recording `error` if given.
    /// `false` means the lease was lost.
    async fn settle(
        &self,
        id: &str,
        target: &str,
        score: i64,
        error: Option<&str>,
    ) -> AppResult<bool> {
        let mut invocation = self.settle_script.prepare_invoke();
        invocation
            .key(&self.keys.active)
            .key(target)
            .key(&self.keys.errors)
            .arg(id)
            .arg(score);
        if let Some(error) = error {
            invocation.arg(error);
        }
        let mut conn = self.client.conn_mut();
        let moved: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(moved == 1)
    }

    async fn load(&self, id: &str) -> AppResult<Option<Envelope>> {
        let mut conn = self.client.conn_mut();
        let (raw, attempts, error): (Option<String>, Option<u32>, Option<String>) = redis::pipe()
            .hget(&self.keys.jobs, id)
            .hget(&self.keys.attempts, id)
            .hget(&self.keys.errors, id)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let mut envelope: Envelope = serde_json::from_str(&raw)?;
        envelope.attempts_made = attempts.unwrap_or(0);
        envelope.last_error = error;
        Ok(Some(envelope))
    }

    /// Delete the given ids from a finished set along with their job data.
    async fn drop_finished(&self, set: &str, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.client.conn_mut();
        let _: () = redis::pipe()
            .atomic()
            .zrem(set, ids)
            .ignore()
            .hdel(&self.keys.jobs, ids)
            .ignore()
            .hdel(&self.keys.attempts, ids)
            .ignore()
            .hdel(&self.keys.errors, ids)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(ids.len() as u64)
    }
}

#[async_trait]
impl QueueBackend for RedisQueueBackend {
    async fn push(&self, envelope: Envelope) -> AppResult<bool> {
        let raw = serde_json::to_string(&envelope)?;
        let mut conn = self.client.conn_mut();
        let created: i64 = self
            .push_script
            .key(&self.keys.jobs)
            .key(&self.keys.wait)
            .arg(&envelope.id)
            .arg(raw)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        if created == 0 {
            return Ok(false);
        }
        debug!(job_id = %envelope.id, "Envelope pushed to Redis queue");
        Ok(true)
    }

    async fn claim(&self, lease: Duration) -> AppResult<Option<Envelope>> {
        let mut conn = self.client.conn_mut();
        let claimed: Option<(String, u32, Option<String>)> = self
            .claim_script
            .key(&self.keys.wait)
            .key(&self.keys.delayed)
            .key(&self.keys.active)
            .key(&self.keys.jobs)
            .key(&self.keys.attempts)
            .key(&self.keys.errors)
            .arg(Self::now_ms())
            .arg(Self::deadline_ms(lease))
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        let Some((raw, attempts, error)) = claimed else {
            return Ok(None);
        };
        let mut envelope: Envelope = serde_json::from_str(&raw)?;
        envelope.attempts_made = attempts;
        envelope.last_error = error;
        Ok(Some(envelope))
    }

    async fn extend_lease(&self, id: &str, lease: Duration) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let extended: i64 = self
            .extend_script
            .key(&self.keys.active)
            .arg(id)
            .arg(Self::deadline_ms(lease))
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(extended == 1)
    }

    async fn complete(&self, id: &str) -> AppResult<bool> {
        self.settle(id, &self.keys.completed, Self::now_ms(), None)
            .await
    }

    async fn retry_after(&self, id: &str, delay: Duration, error: &str) -> AppResult<bool> {
        self.settle(id, &self.keys.delayed, Self::deadline_ms(delay), Some(error))
            .await
    }

    async fn fail(&self, id: &str, error: &str) -> AppResult<bool> {
        self.settle(id, &self.keys.failed, Self::now_ms(), Some(error))
            .await
    }

    async fn recover_stalled(&self) -> AppResult<Vec<Envelope>> {
        let now = Self::now_ms();
        let expired: Vec<String> = {
            let mut conn = self.client.conn_mut();
            conn.zrangebyscore(&self.keys.active, "-inf", now)
                .await
                .map_err(Self::map_err)?
        };

        let mut exhausted = Vec::new();
        for id in expired {
            let Some(mut envelope) = self.load(&id).await? else {
                continue;
            };

            let mut conn = self.client.conn_mut();
            let (outcome, reason): (u8, Option<String>) = self
                .recover_script
                .key(&self.keys.active)
                .key(&self.keys.wait)
                .key(&self.keys.failed)
                .key(&self.keys.errors)
                .key(&self.keys.attempts)
                .arg(&id)
                .arg(now)
                .arg(envelope.max_attempts)
                .invoke_async(&mut conn)
                .await
                .map_err(Self::map_err)?;

            match outcome {
                1 => debug!(job_id = %id, "Stalled job requeued"),
                2 => {
                    envelope.last_error = reason;
                    exhausted.push(envelope);
                }
                // Renewed, settled, or recovered elsewhere meanwhile.
                _ => {}
            }
        }
        Ok(exhausted)
    }

    async fn purge(&self, policy: &RetentionPolicy) -> AppResult<u64> {
        let now = Self::now_ms();
        let completed_cutoff = now - policy.completed_age.as_millis() as i64;
        let failed_cutoff = now - policy.failed_age.as_millis() as i64;

        let mut conn = self.client.conn_mut();
        let old_completed: Vec<String> = conn
            .zrangebyscore(&self.keys.completed, "-inf", completed_cutoff)
            .await
            .map_err(Self::map_err)?;
        let mut removed = self.drop_finished(&self.keys.completed, &old_completed).await?;

        let remaining: usize = conn
            .zcard(&self.keys.completed)
            .await
            .map_err(Self::map_err)?;
        if remaining > policy.completed_count {
            let overflow = remaining - policy.completed_count;
            let oldest: Vec<String> = conn
                .zrange(&self.keys.completed, 0, overflow as isize - 1)
                .await
                .map_err(Self::map_err)?;
            removed += self.drop_finished(&self.keys.completed, &oldest).await?;
        }

        let old_failed: Vec<String> = conn
            .zrangebyscore(&self.keys.failed, "-inf", failed_cutoff)
            .await
            .map_err(Self::map_err)?;
        removed += self.drop_finished(&self.keys.failed, &old_failed).await?;

        Ok(removed)
    }

    async fn stats(&self) -> AppResult<QueueStats> {
        let mut conn = self.client.conn_mut();
        let (waiting, delayed, active, completed, failed): (u64, u64, u64, u64, u64) =
            redis::pipe()
                .llen(&self.keys.wait)
                .zcard(&self.keys.delayed)
                .zcard(&self.keys.active)
                .zcard(&self.keys.completed)
                .zcard(&self.keys.failed)
                .query_async(&mut conn)
                .await
                .map_err(Self::map_err)?;
        Ok(QueueStats {
            waiting,
            delayed,
            active,
            completed,
            failed,
        })
    }

    async fn get(&self, id: &str) -> AppResult<Option<Envelope>> {
        self.load(id).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.client.ping().await.map_err(Self::map_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn references_keys(script: &str, count: usize) -> bool {
        (1..=count).all(|slot| script.contains(&format!("KEYS[{slot}]")))
    }

    #[test]
    fn test_scripts_touch_every_key() {
        assert!(references_keys(CLAIM_SCRIPT, 6));
        assert!(references_keys(PUSH_SCRIPT, 2));
        assert!(references_keys(EXTEND_SCRIPT, 1));
        assert!(references_keys(SETTLE_SCRIPT, 3));
        assert!(references_keys(RECOVER_SCRIPT, 5));
    }

    #[test]
    fn test_transitions_check_ownership_before_writing() {
        // The first command of each transition decides whether the caller
        // still holds the job; nothing is written when it does not.
        let settle = SETTLE_SCRIPT.trim_start();
        assert!(settle.starts_with("if redis.call('ZREM', KEYS[1], ARGV[1]) == 0 then\n  return 0"));

        let extend = EXTEND_SCRIPT.trim_start();
        assert!(extend.starts_with("if not redis.call('ZSCORE', KEYS[1], ARGV[1]) then\n  return 0"));

        let recover = RECOVER_SCRIPT.trim_start();
        assert!(recover.starts_with("local deadline = redis.call('ZSCORE', KEYS[1], ARGV[1])"));
        assert!(recover.find("tonumber(deadline) > tonumber(ARGV[2])") < recover.find("'ZREM'"));
    }

    #[test]
    fn test_push_writes_nothing_for_duplicate_id() {
        let hsetnx = PUSH_SCRIPT.find("HSETNX").unwrap();
        let rpush = PUSH_SCRIPT.find("RPUSH").unwrap();
        let bail = PUSH_SCRIPT.find("return 0").unwrap();
        assert!(hsetnx < bail && bail < rpush);
    }

    #[test]
    fn test_deadline_is_in_the_future() {
        let now = RedisQueueBackend::now_ms();
        assert!(RedisQueueBackend::deadline_ms(Duration::from_secs(5)) >= now + 5_000);
        assert!(RedisQueueBackend::deadline_ms(Duration::MAX) > now);
    }
}
