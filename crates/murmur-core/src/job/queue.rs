//! Work queue contract and the in-memory reference implementation.
//!
//! A queue message is just the job id; the full job state lives in the
//! store. Messages are acknowledged only once the job has reached a terminal
//! status, so a worker crash leaves the message re-deliverable.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

/// Errors surfaced by a queue backend.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue closed")]
    Closed,

    #[error("queue backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// Receive the next job id, or `None` once the queue is closed and
    /// drained.
    async fn pop(&self) -> Result<Option<Uuid>, QueueError>;

    /// Acknowledge a message after its job reached a terminal status.
    async fn ack(&self, job_id: Uuid) -> Result<(), QueueError>;
}

/// FIFO in-memory queue used by tests and the CLI's inline worker.
///
/// Multiple workers may `pop` concurrently; consumption order across workers
/// is not guaranteed, matching the external queue contract.
pub struct InMemoryQueue {
    tx: Mutex<Option<tokio::sync::mpsc::UnboundedSender<Uuid>>>,
    rx: tokio::sync::Mutex<tokio::sync::mpsc::UnboundedReceiver<Uuid>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Close the queue; workers drain the backlog and then see `None`.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn push(&self, job_id: Uuid) -> Result<(), QueueError> {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let tx = guard.as_ref().ok_or(QueueError::Closed)?;
        tx.send(job_id).map_err(|_| QueueError::Closed)
    }

    async fn pop(&self) -> Result<Option<Uuid>, QueueError> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn ack(&self, _job_id: Uuid) -> Result<(), QueueError> {
        // Delivery in the in-memory queue is destructive, nothing to settle.
        Ok(())
    }
}
