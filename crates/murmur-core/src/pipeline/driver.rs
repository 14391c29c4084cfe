//! Per-chunk orchestration: retries, cancellation probes, coverage
//! validation.
//!
//! One chunk moves PENDING → PROCESSING → COMPLETED | FAILED here. Transient
//! provider faults get up to `max_attempts` tries with jittered backoff;
//! results whose transcription leaves a large untranscribed gap at either
//! chunk boundary get up to `coverage_retry_limit` extra attempts, budgeted
//! separately. The job's status is re-read from the store at the start of
//! every attempt and before every backoff sleep so a cancelled job stops
//! consuming provider quota.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::configuration::PipelineConfig;
use crate::error::PipelineError;
use crate::job::store::JobStore;
use crate::job::{ChunkRecord, ChunkStatus, JobStatus, Segment};
use crate::provider::{
    ChunkTranscription, ProviderError, RetryConfig, TranscriptionBackend, TranscriptionRequest,
};

/// How a chunk run ended short of an error.
#[derive(Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    Completed,
    /// The job was cancelled or deleted; the chunk row is left as-is.
    Cancelled,
}

/// Untranscribed audio at the chunk boundaries: `(start_gap, end_gap)`.
///
/// `segments` must be sorted by start time. An empty result counts as a full
/// gap on both sides.
pub fn coverage_gaps(segments: &[Segment], chunk_duration: f64) -> (f64, f64) {
    match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => {
            let start_gap = first.start.max(0.0);
            let end_gap = (chunk_duration - last.end).max(0.0);
            (start_gap, end_gap)
        }
        _ => (chunk_duration, chunk_duration),
    }
}

/// Drives single chunks through the provider with retries.
pub struct ChunkDriver {
    store: Arc<dyn JobStore>,
    backend: Arc<dyn TranscriptionBackend>,
    client: reqwest::Client,
    api_key: String,
    config: PipelineConfig,
    retry: RetryConfig,
}

impl ChunkDriver {
    pub fn new(
        store: Arc<dyn JobStore>,
        backend: Arc<dyn TranscriptionBackend>,
        client: reqwest::Client,
        api_key: String,
        config: PipelineConfig,
    ) -> Self {
        let retry = RetryConfig {
            max_attempts: config.max_attempts,
            ..RetryConfig::default()
        };
        Self {
            store,
            backend,
            client,
            api_key,
            config,
            retry,
        }
    }

    /// True when the job row is gone or CANCELLED.
    async fn job_cancelled(&self, job_id: Uuid) -> Result<bool, PipelineError> {
        Ok(match self.store.get_job(job_id).await? {
            None => true,
            Some(job) => job.status == JobStatus::Cancelled,
        })
    }

    /// Run one chunk through up to `max_attempts` provider attempts plus the
    /// separate coverage-retry budget.
    ///
    /// On success the chunk row holds the accepted segments and metadata; on
    /// a non-retryable fault (or an exhausted budget) the chunk row is FAILED
    /// and the error is returned so the orchestrator can fail the job.
    pub async fn run(
        &self,
        job_id: Uuid,
        chunk: &mut ChunkRecord,
        audio: Vec<u8>,
        context_text: Option<String>,
        prompt: Option<String>,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<ChunkOutcome, PipelineError> {
        let chunk_duration = chunk.duration();
        let mut transient_failures = 0u32;
        let mut coverage_retries = 0u32;
        // Best result seen so far, by smallest max-gap.
        let mut best: Option<(f64, ChunkTranscription)> = None;

        loop {
            if self.job_cancelled(job_id).await? {
                return Ok(ChunkOutcome::Cancelled);
            }

            chunk.status = ChunkStatus::Processing;
            chunk.attempt_count += 1;
            self.store.update_chunk(chunk).await?;

            let request = TranscriptionRequest {
                audio_data: audio.clone(),
                language: language.to_string(),
                prompt: prompt.clone(),
                context_text: context_text.clone(),
                chunk_index: chunk.index,
                chunk_duration,
                cancel: cancel.clone(),
            };

            match self
                .backend
                .transcribe(&self.client, &self.api_key, request)
                .await
            {
                Ok(mut result) => {
                    result
                        .segments
                        .sort_by(|a, b| a.start.total_cmp(&b.start));
                    let (start_gap, end_gap) = coverage_gaps(&result.segments, chunk_duration);
                    let max_gap = start_gap.max(end_gap);
                    if best.as_ref().is_none_or(|(gap, _)| max_gap < *gap) {
                        best = Some((max_gap, result));
                    }

                    if max_gap > self.config.coverage_gap_threshold
                        && coverage_retries < self.config.coverage_retry_limit
                    {
                        coverage_retries += 1;
                        crate::warn!(
                            "chunk {} coverage gap {:.1}s exceeds {:.1}s, retrying ({}/{})",
                            chunk.index,
                            max_gap,
                            self.config.coverage_gap_threshold,
                            coverage_retries,
                            self.config.coverage_retry_limit
                        );
                        continue;
                    }

                    // A cancel that landed while the call was in flight
                    // discards the result.
                    if self.job_cancelled(job_id).await? {
                        return Ok(ChunkOutcome::Cancelled);
                    }

                    // Budget spent (or the result is fine): accept the best
                    // attempt seen.
                    let (accepted_gap, accepted) = best.take().unwrap_or_else(|| {
                        (max_gap, ChunkTranscription {
                            segments: Vec::new(),
                            metadata: Default::default(),
                        })
                    });
                    crate::verbose!(
                        "chunk {} completed after {} attempt(s), max gap {:.1}s",
                        chunk.index,
                        chunk.attempt_count,
                        accepted_gap
                    );
                    chunk.segments = accepted.segments;
                    chunk.metadata = Some(accepted.metadata);
                    chunk.last_error = None;
                    chunk.status = ChunkStatus::Completed;
                    self.store.update_chunk(chunk).await?;
                    return Ok(ChunkOutcome::Completed);
                }
                Err(ProviderError::Cancelled) => {
                    return Ok(ChunkOutcome::Cancelled);
                }
                Err(err)
                    if err.is_retryable()
                        && transient_failures < self.retry.max_attempts.saturating_sub(1) =>
                {
                    transient_failures += 1;
                    chunk.last_error = Some(err.to_string());
                    self.store.update_chunk(chunk).await?;

                    let delay = self.retry.delay_for_attempt(transient_failures);
                    crate::warn!(
                        "chunk {} attempt {} failed ({}); retrying in {:.1}s",
                        chunk.index,
                        chunk.attempt_count,
                        err,
                        delay.as_secs_f64()
                    );
                    if self.job_cancelled(job_id).await? {
                        return Ok(ChunkOutcome::Cancelled);
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(ChunkOutcome::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    chunk.last_error = Some(err.to_string());
                    chunk.status = ChunkStatus::Failed;
                    self.store.update_chunk(chunk).await?;
                    return Err(err.into());
                }
            }
        }
    }
}

/// Trailing text of a completed chunk, used as context for the next one.
pub fn trailing_context(segments: &[Segment], count: usize) -> Option<String> {
    if segments.is_empty() || count == 0 {
        return None;
    }
    let skip = segments.len().saturating_sub(count);
    let text = segments[skip..]
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}
