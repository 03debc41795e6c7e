//! In-memory job store.
//!
//! Lives for the process lifetime only; nothing is persisted. The store is
//! an owned object cloned into `AppState` rather than a global. Workers run
//! on tokio's multi-threaded runtime, so the map sits behind an async
//! `RwLock` — one writer (the owning worker) per key by convention, many
//! readers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::queue::jobs::{Job, JobPatch};
use crate::types::{AppError, AppResult};

#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. Ids come from `Uuid::new_v4` and are never
    /// reused, so a duplicate means a caller bug.
    pub async fn create(&self, job: Job) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(AppError::Internal(format!("duplicate job id {}", job.id)));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    /// Cloned snapshot of the record. `None` covers purged, expired and
    /// never-existed alike; callers cannot tell these apart.
    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Merge a partial update into an existing record. The id is held by
    /// the worker that created it, so a miss means the record was reaped
    /// out from under a catastrophically oversized store.
    pub async fn update(&self, id: Uuid, patch: JobPatch) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("job {id}")))?;
        patch.apply(job);
        Ok(())
    }

    pub async fn size(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// All job ids ordered oldest first by `created_at`.
    pub async fn ids_by_recency(&self) -> Vec<Uuid> {
        let jobs = self.jobs.read().await;
        let mut entries: Vec<(Uuid, chrono::DateTime<chrono::Utc>)> =
            jobs.values().map(|j| (j.id, j.created_at)).collect();
        entries.sort_by_key(|(_, created_at)| *created_at);
        entries.into_iter().map(|(id, _)| id).collect()
    }

    /// Idempotent delete.
    pub async fn remove(&self, id: Uuid) {
        self.jobs.write().await.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::jobs::{DocType, JobKind, JobStatus};
    use chrono::Duration;

    fn sample_job() -> Job {
        Job::new(
            JobKind::Document {
                doc_type: DocType::Functions,
                level: "beginner".to_string(),
                text: "fn main() {}".to_string(),
                questions: String::new(),
            },
            None,
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = JobStore::new();
        let job = sample_job();
        let id = job.id;

        store.create(job).await.unwrap();
        let found = store.get(id).await.unwrap();
        assert_eq!(found.status, JobStatus::Pending);
        assert_eq!(store.size().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_is_rejected() {
        let store = JobStore::new();
        let job = sample_job();
        store.create(job.clone()).await.unwrap();
        assert!(store.create(job).await.is_err());
        assert_eq!(store.size().await, 1);
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_none() {
        let store = JobStore::new();
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_job_errors() {
        let store = JobStore::new();
        let err = store
            .update(Uuid::new_v4(), JobPatch::progress(0.5, "halfway"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = JobStore::new();
        let job = sample_job();
        let id = job.id;
        store.create(job).await.unwrap();

        store
            .update(id, JobPatch::progress(0.4, "Analyzing 1 lines with AI..."))
            .await
            .unwrap();
        let job = store.get(id).await.unwrap();
        assert_eq!(job.progress, 0.4);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = JobStore::new();
        let job = sample_job();
        let id = job.id;
        store.create(job).await.unwrap();

        store.remove(id).await;
        store.remove(id).await;
        assert_eq!(store.size().await, 0);
    }

    #[tokio::test]
    async fn test_ids_by_recency_orders_oldest_first() {
        let store = JobStore::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            let mut job = sample_job();
            // Spread created_at so ordering does not depend on clock precision
            job.created_at = chrono::Utc::now() + Duration::seconds(i);
            ids.push(job.id);
            store.create(job).await.unwrap();
        }
        assert_eq!(store.ids_by_recency().await, ids);
    }
}
