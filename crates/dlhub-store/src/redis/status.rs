//! Redis status store: one hash per job, re-expired on every write.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use redis::AsyncCommands;
use tracing::debug;

use dlhub_core::config::StatusConfig;
use dlhub_core::error::{AppError, ErrorKind};
use dlhub_core::result::AppResult;
use dlhub_core::traits::StatusStore;
use dlhub_entity::{FileStatus, JobStage, JobStatus, Progress, StatusPatch};

use super::client::RedisClient;
use crate::keys;

/// Nullable hash fields, deleted when the record holds no value.
const NULLABLE_FIELDS: [&str; 3] = ["completedAt", "downloadUrl", "error"];

/// Redis-backed status store.
#[derive(Debug, Clone)]
pub struct RedisStatusStore {
    /// Redis client.
    client: RedisClient,
    /// Retention window applied on every write.
    retention: Duration,
}

impl RedisStatusStore {
    /// Create a new Redis status store.
    pub fn new(client: RedisClient, config: &StatusConfig) -> Self {
        Self {
            client,
            retention: config.retention(),
        }
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Store, format!("Redis error: {e}"), e)
    }

    async fn read_hash(&self, full_key: &str) -> AppResult<HashMap<String, String>> {
        let mut conn = self.client.conn_mut();
        let fields: HashMap<String, String> =
            conn.hgetall(full_key).await.map_err(Self::map_err)?;
        Ok(fields)
    }
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn upsert(&self, job_id: &str, patch: StatusPatch) -> AppResult<JobStatus> {
        let full_key = self.client.prefixed_key(&keys::job_status(job_id));
        let now = Utc::now();

        let current = decode_record(job_id, &self.read_hash(&full_key).await?, now)?;
        let record = patch.apply(job_id, current, now)?;
        let (set, clear) = encode_record(&record)?;

        let mut pipe = redis::pipe();
        pipe.atomic().hset_multiple(&full_key, &set).ignore();
        if !clear.is_empty() {
            pipe.hdel(&full_key, clear).ignore();
        }
        pipe.expire(&full_key, self.retention.as_secs() as i64).ignore();

        let mut conn = self.client.conn_mut();
        let _: () = pipe.query_async(&mut conn).await.map_err(Self::map_err)?;

        debug!(job_id, status = %record.status, current = record.progress.current, "Status upserted");
        Ok(record)
    }

    async fn get(&self, job_id: &str) -> AppResult<Option<JobStatus>> {
        let full_key = self.client.prefixed_key(&keys::job_status(job_id));
        let fields = self.read_hash(&full_key).await?;
        decode_record(job_id, &fields, Utc::now())
    }

    async fn list_all(&self) -> AppResult<Vec<JobStatus>> {
        let full_keys = self
            .client
            .scan_keys(&keys::job_status_pattern())
            .await
            .map_err(Self::map_err)?;
        let status_prefix = self.client.prefixed_key(&keys::job_status(""));

        let mut records = Vec::with_capacity(full_keys.len());
        for full_key in &full_keys {
            let job_id = full_key.strip_prefix(&status_prefix).unwrap_or(full_key);
            let fields = self.read_hash(full_key).await?;
            if let Some(record) = decode_record(job_id, &fields, Utc::now())? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.client.ping().await.map_err(Self::map_err)
    }
}

fn format_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_time(value: Option<&String>) -> Option<DateTime<Utc>> {
    value
        .filter(|v| !v.is_empty())
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|at| at.with_timezone(&Utc))
}

/// Flatten a record into hash fields to set and nullable fields to delete.
pub(crate) fn encode_record(
    record: &JobStatus,
) -> AppResult<(Vec<(&'static str, String)>, Vec<&'static str>)> {
    let mut set = vec![
        ("jobId", record.job_id.clone()),
        ("status", record.status.as_str().to_string()),
        ("progress", serde_json::to_string(&record.progress)?),
        ("files", serde_json::to_string(&record.files)?),
        ("createdAt", format_time(&record.created_at)),
        ("updatedAt", format_time(&record.updated_at)),
    ];
    let mut clear = Vec::new();

    let nullable = [
        record.completed_at.as_ref().map(format_time),
        record.download_url.clone(),
        record.error.clone(),
    ];
    for (field, value) in NULLABLE_FIELDS.into_iter().zip(nullable) {
        match value {
            Some(v) => set.push((field, v)),
            None => clear.push(field),
        }
    }

    Ok((set, clear))
}

/// Rebuild a record from hash fields, defaulting anything absent.
///
/// An empty hash means the record is unknown or expired.
pub(crate) fn decode_record(
    job_id: &str,
    fields: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> AppResult<Option<JobStatus>> {
    if fields.is_empty() {
        return Ok(None);
    }

    let progress: Progress = match fields.get("progress") {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
        _ => Progress::default(),
    };
    let files: Vec<FileStatus> = match fields.get("files") {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
        _ => Vec::new(),
    };
    let status = fields
        .get("status")
        .and_then(|s| JobStage::parse(s))
        .unwrap_or_default();
    let non_empty = |field: &str| fields.get(field).filter(|v| !v.is_empty()).cloned();

    Ok(Some(JobStatus {
        job_id: non_empty("jobId").unwrap_or_else(|| job_id.to_string()),
        status,
        progress,
        files,
        created_at: parse_time(fields.get("createdAt")).unwrap_or(now),
        updated_at: parse_time(fields.get("updatedAt")).unwrap_or(now),
        completed_at: parse_time(fields.get("completedAt")),
        download_url: non_empty("downloadUrl"),
        error: non_empty("error"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_decode_empty_hash_is_absent() {
        assert!(decode_record("j", &HashMap::new(), Utc::now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_defaults_missing_fields() {
        let now = Utc::now();
        let record = decode_record("j", &hash(&[("status", "processing")]), now)
            .unwrap()
            .unwrap();
        assert_eq!(record.job_id, "j");
        assert_eq!(record.status, JobStage::Processing);
        assert_eq!(record.progress, Progress::default());
        assert!(record.files.is_empty());
        assert_eq!(record.created_at, now);
        assert!(record.error.is_none());
    }

    #[test]
    fn test_encode_clears_null_fields() {
        let mut record = JobStatus::empty("j", Utc::now());
        record.error = Some("disk full".into());
        let (set, clear) = encode_record(&record).unwrap();
        assert!(set.iter().any(|(k, v)| *k == "error" && v == "disk full"));
        assert_eq!(clear, vec!["completedAt", "downloadUrl"]);
    }

    #[test]
    fn test_encode_then_decode_preserves_record() {
        let now = DateTime::parse_from_rfc3339("2026-01-02T03:04:05.678Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut record = JobStatus::empty("j", now);
        record.status = JobStage::Completed;
        record.progress = Progress::finished(1);
        record.files = vec![FileStatus::queued(70000)];
        record.files[0].complete(4096);
        record.completed_at = Some(now);
        record.download_url = Some("https://storage.example.com/jobs/j/download".into());

        let (set, _) = encode_record(&record).unwrap();
        let fields: HashMap<String, String> =
            set.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        let decoded = decode_record("j", &fields, Utc::now()).unwrap().unwrap();
        assert_eq!(decoded, record);
    }
}
