//! Job and early-result storage abstractions.
//!
//! Traits live here; implementations may be backed by any keyed store. The
//! in-memory variants are used by tests and single-process deployments.
//!
//! # Concurrency
//!
//! All durable state lives in the [`JobStore`], updated via idempotent
//! partial-field upserts keyed by job id. The [`EarlyResultStore`] is a
//! write-once-per-key, read-many channel between fire-and-forget background
//! tasks and the polling orchestrators: each composite key
//! (`"<session>:copy"`, `"<session>:qa"`) has exactly one writer, so no
//! coordination beyond the store's own map lock is needed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::job::{JobId, JobStatus, JobUpdate, QueueItem, SpellingError};

/// Error types for storage operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// Storage backend error (database, network, etc.)
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenient Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent keyed record of pipeline state.
///
/// # Thread Safety
///
/// All methods take `&self`; implementations must be internally
/// synchronized. Use `Arc<dyn JobStore>` for shared ownership.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Get a job record by id. Returns `None` if the job doesn't exist.
    async fn get(&self, job_id: &str) -> StoreResult<Option<QueueItem>>;

    /// Insert a new job record (the enqueue operation).
    async fn insert(&self, item: QueueItem) -> StoreResult<()>;

    /// Apply a partial-field update to a job record.
    ///
    /// Idempotent: re-applying the same update leaves the record in the
    /// same state (timestamps aside). Errors with [`StoreError::NotFound`]
    /// if the job doesn't exist.
    async fn update(&self, job_id: &str, update: JobUpdate) -> StoreResult<()>;

    /// Guarded `queued -> processing` transition.
    ///
    /// Returns `true` iff this call performed the transition. A job that is
    /// already processing or terminal is not claimable, which keeps
    /// concurrent `process` invocations on the same id from racing on
    /// persisted state.
    async fn claim(&self, job_id: &str) -> StoreResult<bool>;
}

/// Result of the early copy-generation background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyCopyResult {
    pub subject_lines: Vec<String>,
    pub preview_texts: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl EarlyCopyResult {
    pub fn has_candidates(&self) -> bool {
        !self.subject_lines.is_empty() || !self.preview_texts.is_empty()
    }
}

/// Result of the early spelling-check background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlySpellingResult {
    pub errors: Vec<SpellingError>,
    pub created_at: DateTime<Utc>,
}

/// A completed background-task result, written once under its session key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EarlyTaskResult {
    Copy(EarlyCopyResult),
    Spelling(EarlySpellingResult),
}

/// Session-keyed store for background-task results.
///
/// Ephemeral: entries may be garbage-collected after job completion. A
/// result that lands after its poller timed out is simply never consumed.
#[async_trait]
pub trait EarlyResultStore: Send + Sync {
    /// Write a task result under its composite session key.
    async fn put(&self, key: &str, result: EarlyTaskResult) -> StoreResult<()>;

    /// Read a task result, `None` if the task hasn't completed.
    async fn get(&self, key: &str) -> StoreResult<Option<EarlyTaskResult>>;

    /// Drop a result. Idempotent.
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

/// In-memory [`JobStore`], for tests and single-process use.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<JobId, QueueItem>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, job_id: &str) -> StoreResult<Option<QueueItem>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn insert(&self, item: QueueItem) -> StoreResult<()> {
        self.jobs.write().await.insert(item.id.clone(), item);
        Ok(())
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let item = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        item.apply(update);
        Ok(())
    }

    async fn claim(&self, job_id: &str) -> StoreResult<bool> {
        let mut jobs = self.jobs.write().await;
        let item = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        if item.status != JobStatus::Queued {
            return Ok(false);
        }
        item.status = JobStatus::Processing;
        item.updated_at = Utc::now();
        Ok(true)
    }
}

/// In-memory [`EarlyResultStore`].
#[derive(Clone, Default)]
pub struct InMemoryEarlyResultStore {
    results: Arc<RwLock<HashMap<String, EarlyTaskResult>>>,
}

impl InMemoryEarlyResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EarlyResultStore for InMemoryEarlyResultStore {
    async fn put(&self, key: &str, result: EarlyTaskResult) -> StoreResult<()> {
        self.results.write().await.insert(key.to_string(), result);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<EarlyTaskResult>> {
        Ok(self.results.read().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.results.write().await.remove(key);
        Ok(())
    }
}

/// Blanket implementation of JobStore for Arc<T>
#[async_trait]
impl<T: JobStore + ?Sized> JobStore for Arc<T> {
    async fn get(&self, job_id: &str) -> StoreResult<Option<QueueItem>> {
        (**self).get(job_id).await
    }

    async fn insert(&self, item: QueueItem) -> StoreResult<()> {
        (**self).insert(item).await
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> StoreResult<()> {
        (**self).update(job_id, update).await
    }

    async fn claim(&self, job_id: &str) -> StoreResult<bool> {
        (**self).claim(job_id).await
    }
}

/// Blanket implementation of EarlyResultStore for Arc<T>
#[async_trait]
impl<T: EarlyResultStore + ?Sized> EarlyResultStore for Arc<T> {
    async fn put(&self, key: &str, result: EarlyTaskResult) -> StoreResult<()> {
        (**self).put(key, result).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<EarlyTaskResult>> {
        (**self).get(key).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        (**self).remove(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let store = InMemoryJobStore::new();
        let item = QueueItem::new("job-1", "https://cdn.example.com/a.png");
        store.insert(item).await.unwrap();

        let fetched = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(fetched.id, "job-1");
        assert_eq!(fetched.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn get_missing_job_returns_none() {
        let store = InMemoryJobStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_job_errors() {
        let store = InMemoryJobStore::new();
        let err = store.update("nope", JobUpdate::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn claim_transitions_exactly_once() {
        let store = InMemoryJobStore::new();
        store
            .insert(QueueItem::new("job-1", "https://cdn.example.com/a.png"))
            .await
            .unwrap();

        assert!(store.claim("job-1").await.unwrap());
        assert!(!store.claim("job-1").await.unwrap());

        let item = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(item.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn claim_rejects_terminal_jobs() {
        let store = InMemoryJobStore::new();
        store
            .insert(QueueItem::new("job-1", "https://cdn.example.com/a.png"))
            .await
            .unwrap();
        store
            .update(
                "job-1",
                JobUpdate {
                    status: Some(JobStatus::Failed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(!store.claim("job-1").await.unwrap());
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let store1 = InMemoryJobStore::new();
        let store2 = store1.clone();
        store1
            .insert(QueueItem::new("job-1", "https://cdn.example.com/a.png"))
            .await
            .unwrap();
        assert!(store2.get("job-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn early_store_put_get_remove() {
        let store = InMemoryEarlyResultStore::new();
        let key = "sess-abc:copy";

        assert!(store.get(key).await.unwrap().is_none());

        store
            .put(
                key,
                EarlyTaskResult::Copy(EarlyCopyResult {
                    subject_lines: vec!["Fresh drops".to_string()],
                    preview_texts: vec!["Inside: new arrivals".to_string()],
                    created_at: Utc::now(),
                }),
            )
            .await
            .unwrap();

        match store.get(key).await.unwrap() {
            Some(EarlyTaskResult::Copy(copy)) => {
                assert_eq!(copy.subject_lines.len(), 1);
                assert!(copy.has_candidates());
            }
            other => panic!("unexpected result: {:?}", other),
        }

        store.remove(key).await.unwrap();
        assert!(store.get(key).await.unwrap().is_none());
        // Idempotent
        store.remove(key).await.unwrap();
    }

    #[tokio::test]
    async fn early_result_serde_roundtrip() {
        let result = EarlyTaskResult::Spelling(EarlySpellingResult {
            errors: vec![SpellingError {
                text: "teh".to_string(),
                location: "footer".to_string(),
                suggestion: Some("the".to_string()),
            }],
            created_at: Utc::now(),
        });

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"kind\":\"spelling\""));
        let parsed: EarlyTaskResult = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, EarlyTaskResult::Spelling(s) if s.errors.len() == 1));
    }
}
