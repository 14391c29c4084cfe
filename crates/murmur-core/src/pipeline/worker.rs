//! Worker pool: parallel across jobs, sequential within a job.
//!
//! Each worker owns one job at a time; a job's chunks are therefore always
//! processed in index order on a single worker, which the context injection
//! and the merger both rely on. The queue message is acknowledged only once
//! the job sits in a terminal status.

use std::sync::Arc;

use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::job::queue::JobQueue;

use super::orchestrator::Pipeline;

pub struct WorkerPool {
    pipeline: Arc<Pipeline>,
    queue: Arc<dyn JobQueue>,
}

impl WorkerPool {
    pub fn new(pipeline: Arc<Pipeline>, queue: Arc<dyn JobQueue>) -> Self {
        Self { pipeline, queue }
    }

    /// Sweep stale jobs, then run `workers` consumers until the queue
    /// closes.
    pub async fn run(&self, workers: usize) -> Result<(), PipelineError> {
        let swept = self.pipeline.recover_stale_jobs().await?;
        if swept > 0 {
            crate::info!("stale sweep failed {swept} abandoned job(s)");
        }

        let mut tasks = JoinSet::new();
        for worker_id in 0..workers.max(1) {
            let pipeline = Arc::clone(&self.pipeline);
            let queue = Arc::clone(&self.queue);
            tasks.spawn(async move {
                while let Ok(Some(job_id)) = queue.pop().await {
                    crate::verbose!("[worker {worker_id}] picked up job {job_id}");
                    if let Err(err) = process_and_settle(&pipeline, queue.as_ref(), job_id).await {
                        crate::error!("[worker {worker_id}] job {job_id}: {err}");
                    }
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                crate::error!("worker task panicked: {err}");
            }
        }
        Ok(())
    }
}

async fn process_and_settle(
    pipeline: &Pipeline,
    queue: &dyn JobQueue,
    job_id: Uuid,
) -> Result<(), PipelineError> {
    pipeline.process_job(job_id).await?;

    // Ack only on terminal status; anything else goes back on the queue.
    match pipeline.store().get_job(job_id).await? {
        None => queue.ack(job_id).await?,
        Some(job) if job.status.is_terminal() => queue.ack(job_id).await?,
        Some(job) => {
            crate::warn!(
                "job {job_id} still {} after processing, requeueing",
                job.status.as_str()
            );
            // Brief pause so an in-memory queue does not spin while another
            // worker holds the job.
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            queue.push(job_id).await?;
        }
    }
    Ok(())
}
