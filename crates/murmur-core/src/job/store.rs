//! Job/chunk store contract and the in-memory reference implementation.
//!
//! The production deployment backs this trait with a relational database;
//! the pipeline only relies on the operations below:
//!
//! - guarded, atomic job status transitions
//! - row-scoped job and chunk updates
//! - ordered chunk reads per job
//! - cascade delete of a job's chunks
//! - bulk recovery of stale jobs for the start-up sweep
//!
//! Status stickiness is enforced here: `update_job`/`update_chunk` never move
//! a row out of a terminal status, and `transition_job` only succeeds when
//! the current status is in the caller's expected set.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ChunkRecord, Job, JobStatus};
use crate::error::ErrorCode;

/// Errors surfaced by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    #[error("store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: Job) -> Result<(), StoreError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Overwrite a job row's fields. The stored status is preserved; status
    /// changes go through [`transition_job`](Self::transition_job) so that
    /// terminal states stay sticky under concurrent cancellation.
    async fn update_job(&self, job: &Job) -> Result<(), StoreError>;

    /// Atomically move a job from one of `from` to `to`. Returns `false`
    /// without writing when the current status is not in `from`. Terminal
    /// statuses cannot be left, with the single exception of
    /// FAILED → PENDING used by job retry.
    async fn transition_job(
        &self,
        id: Uuid,
        from: &[JobStatus],
        to: JobStatus,
    ) -> Result<bool, StoreError>;

    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), StoreError>;

    /// All chunks of a job, ordered by index.
    async fn get_chunks(&self, job_id: Uuid) -> Result<Vec<ChunkRecord>, StoreError>;

    /// Overwrite a chunk row. A chunk already in COMPLETED or FAILED is left
    /// untouched.
    async fn update_chunk(&self, chunk: &ChunkRecord) -> Result<(), StoreError>;

    /// Remove a job's chunk rows (used when a failed job is retried from
    /// scratch).
    async fn clear_chunks(&self, job_id: Uuid) -> Result<(), StoreError>;

    /// Delete a job and cascade-delete its chunks. Returns `false` if the
    /// job did not exist.
    async fn delete_job(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Fail every job stuck in UPLOADED or PROCESSING whose last update is
    /// older than `older_than`. Returns the affected job ids.
    async fn mark_stale_jobs(&self, older_than: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError>;
}

/// In-memory store used by tests and the CLI's inline worker.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    jobs: HashMap<Uuid, Job>,
    chunks: HashMap<Uuid, Vec<ChunkRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // Lock poisoning only happens after a panic in this module.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert_job(&self, job: Job) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.chunks.entry(job.id).or_default();
        inner.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn update_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let row = inner
            .jobs
            .get_mut(&job.id)
            .ok_or(StoreError::JobNotFound(job.id))?;
        let status = row.status;
        *row = job.clone();
        row.status = status;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn transition_job(
        &self,
        id: Uuid,
        from: &[JobStatus],
        to: JobStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let row = inner.jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        let allowed = if row.status.is_terminal() {
            // The only way out of a terminal status is retrying a failure.
            row.status == JobStatus::Failed && to == JobStatus::Pending
        } else {
            true
        };
        if !allowed || !from.contains(&row.status) {
            return Ok(false);
        }
        row.status = to;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        for chunk in chunks {
            inner.chunks.entry(chunk.job_id).or_default().push(chunk);
        }
        Ok(())
    }

    async fn get_chunks(&self, job_id: Uuid) -> Result<Vec<ChunkRecord>, StoreError> {
        let mut chunks = self
            .lock()
            .chunks
            .get(&job_id)
            .cloned()
            .unwrap_or_default();
        chunks.sort_by_key(|c| c.index);
        Ok(chunks)
    }

    async fn update_chunk(&self, chunk: &ChunkRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let rows = inner
            .chunks
            .get_mut(&chunk.job_id)
            .ok_or(StoreError::JobNotFound(chunk.job_id))?;
        if let Some(row) = rows.iter_mut().find(|c| c.index == chunk.index) {
            if !row.status.is_terminal() {
                *row = chunk.clone();
            }
        }
        Ok(())
    }

    async fn clear_chunks(&self, job_id: Uuid) -> Result<(), StoreError> {
        self.lock().chunks.insert(job_id, Vec::new());
        Ok(())
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        inner.chunks.remove(&id);
        Ok(inner.jobs.remove(&id).is_some())
    }

    async fn mark_stale_jobs(&self, older_than: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let mut inner = self.lock();
        let mut stale = Vec::new();
        for job in inner.jobs.values_mut() {
            let stuck = matches!(job.status, JobStatus::Uploaded | JobStatus::Processing);
            if stuck && job.updated_at < older_than {
                job.status = JobStatus::Failed;
                job.error_code = Some(ErrorCode::Unknown);
                job.error_message = Some("job abandoned by a crashed worker".into());
                job.finished_at = Some(Utc::now());
                job.updated_at = Utc::now();
                stale.push(job.id);
            }
        }
        Ok(stale)
    }
}
