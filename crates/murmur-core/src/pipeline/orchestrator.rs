//! Job orchestration: owns the job state machine and drives the pipeline
//! stages in order (normalize → chunk → transcribe → merge).
//!
//! State machine: PENDING → UPLOADED → PROCESSING → COMPLETED | FAILED,
//! with CANCELLED reachable from any non-terminal state through the store.
//! Terminal states are sticky; every transition goes through the store's
//! guarded compare-and-set.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audio::{self, ChunkerConfig, CutChunk};
use crate::configuration::{CANCEL_POLL_INTERVAL_SECS, PipelineConfig};
use crate::error::{ErrorCode, PipelineError};
use crate::job::queue::JobQueue;
use crate::job::store::JobStore;
use crate::job::{
    ChunkRecord, Job, JobStatus, NewJob, TranscriptBody, TranscriptDocument,
};
use crate::pipeline::driver::{ChunkDriver, ChunkOutcome, trailing_context};
use crate::pipeline::merge;
use crate::provider::{ProviderError, ProviderRegistry, TranscriptionBackend};
use crate::storage::{self, BlobStore};

/// Parameters accepted when submitting a job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub provider: String,
    pub language: String,
    pub prompt: Option<String>,
    pub webhook_url: Option<String>,
}

/// The transcription pipeline: everything a worker needs to take a job from
/// PENDING to a terminal status.
pub struct Pipeline {
    store: Arc<dyn JobStore>,
    blobs: Arc<dyn BlobStore>,
    registry: Arc<ProviderRegistry>,
    config: PipelineConfig,
    client: reqwest::Client,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        blobs: Arc<dyn BlobStore>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        Self::with_registry(store, blobs, config, Arc::new(ProviderRegistry::new()))
    }

    /// Build a pipeline with a custom registry (tests register stub
    /// backends here).
    pub fn with_registry(
        store: Arc<dyn JobStore>,
        blobs: Arc<dyn BlobStore>,
        config: PipelineConfig,
        registry: Arc<ProviderRegistry>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.provider_timeout)
            .build()
            .map_err(|e| PipelineError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            store,
            blobs,
            registry,
            config,
            client,
        })
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Upload a local artifact and create its PENDING job, modelling the
    /// intake surface's hand-off.
    pub async fn submit(&self, path: &Path, request: JobRequest) -> Result<Job, PipelineError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let data = tokio::fs::read(path).await?;
        let size_bytes = data.len() as u64;

        let mut job = Job::new(NewJob {
            original_filename: filename.clone(),
            size_bytes,
            extension,
            source_key: String::new(),
            provider: request.provider,
            language: request.language,
            prompt: request.prompt,
            webhook_url: request.webhook_url,
        });
        job.source_key = storage::original_key(job.id, &filename);

        self.blobs.put(&job.source_key, data).await?;
        self.store.insert_job(job.clone()).await?;
        crate::info!("job {} submitted ({} bytes)", job.id, size_bytes);
        Ok(job)
    }

    /// Process one job to a terminal status. Infrastructure errors (store or
    /// storage down) bubble up; domain failures land on the job row.
    pub async fn process_job(&self, job_id: Uuid) -> Result<(), PipelineError> {
        let Some(job) = self.store.get_job(job_id).await? else {
            crate::info!("job {job_id} no longer exists, skipping");
            return Ok(());
        };
        if job.status.is_terminal() {
            crate::verbose!("job {job_id} already {}", job.status.as_str());
            return Ok(());
        }

        // The artifact reference arrived with the job; confirm the hand-off.
        self.store
            .transition_job(job_id, &[JobStatus::Pending], JobStatus::Uploaded)
            .await?;
        if !self
            .store
            .transition_job(job_id, &[JobStatus::Uploaded], JobStatus::Processing)
            .await?
        {
            crate::verbose!("job {job_id} not claimable, skipping");
            return Ok(());
        }

        let started = Instant::now();
        let cancel = CancellationToken::new();
        let watcher = self.spawn_cancel_watcher(job_id, cancel.clone());
        let result = self.run_stages(job_id, started, &cancel).await;
        watcher.abort();

        match result {
            Ok(()) => Ok(()),
            Err(PipelineError::Cancelled) => {
                crate::info!("job {job_id} cancelled");
                Ok(())
            }
            Err(err) => {
                self.fail_job(job_id, &err).await?;
                Ok(())
            }
        }
    }

    /// The actual stage sequence; every early return leaves the per-job temp
    /// directory to be removed by `TempDir`'s drop.
    async fn run_stages(
        &self,
        job_id: Uuid,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let mut job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(PipelineError::Cancelled)?;

        let backend = self
            .registry
            .get(&job.provider)
            .ok_or_else(|| PipelineError::config(format!("unknown provider '{}'", job.provider)))?;
        let api_key = self.resolve_api_key(backend.as_ref())?;

        let workdir = tempfile::tempdir()?;

        // Fetch the artifact and normalize it to mono 16-kHz WAV.
        let original = workdir.path().join(format!("original.{}", job.extension));
        let data = self.blobs.get(&job.source_key).await?;
        tokio::fs::write(&original, data).await?;

        let extension = job.extension.clone();
        let norm_dir = workdir.path().to_path_buf();
        let normalized = tokio::task::spawn_blocking(move || {
            audio::normalize(&original, &extension, &norm_dir)
        })
        .await
        .map_err(|e| PipelineError::other(format!("normalize task panicked: {e}")))??;

        let duration = normalized.duration_seconds;
        job.duration_seconds = Some(duration);
        self.store.update_job(&job).await?;
        crate::info!("job {job_id}: {duration:.1}s of audio");

        // Plan silence-aligned chunks and cut them to their own WAVs.
        let chunker_config = ChunkerConfig {
            max_chunk_duration: self.config.max_chunk_duration,
            overlap_duration: self.config.overlap_duration,
        };
        let chunk_dir = workdir.path().join("chunks");
        tokio::fs::create_dir_all(&chunk_dir).await?;
        let wav_path = normalized.path.clone();
        let cut_chunks = tokio::task::spawn_blocking(move || {
            let wav = audio::wav::read_wav_mono(&wav_path)?;
            let silence = audio::detect_silence(&wav.samples, wav.sample_rate);
            let spans = audio::plan_chunks(wav.duration_seconds(), &silence, &chunker_config);
            let cut = audio::cut_chunks(&wav, &spans, &chunk_dir)?;
            Ok::<Vec<CutChunk>, PipelineError>(cut)
        })
        .await
        .map_err(|e| PipelineError::other(format!("chunking task panicked: {e}")))??;

        let mut records = Vec::with_capacity(cut_chunks.len());
        for chunk in &cut_chunks {
            let key = storage::chunk_key(job_id, chunk.index);
            let bytes = tokio::fs::read(&chunk.path).await?;
            self.blobs.put(&key, bytes).await?;
            records.push(ChunkRecord::new(
                job_id,
                chunk.index,
                chunk.span.start,
                chunk.span.end,
                key,
            ));
        }
        self.store.insert_chunks(records.clone()).await?;
        job.total_chunks = records.len() as u32;
        self.store.update_job(&job).await?;
        crate::info!("job {job_id}: {} chunk(s) planned", records.len());

        // Drive chunks sequentially; chunk N+1 receives
        // chunk N's trailing text as context.
        let driver = ChunkDriver::new(
            Arc::clone(&self.store),
            Arc::clone(&backend),
            self.client.clone(),
            api_key,
            self.config.clone(),
        );
        let mut context_text: Option<String> = None;
        for (record, cut) in records.iter_mut().zip(&cut_chunks) {
            let audio_bytes = tokio::fs::read(&cut.path).await?;
            let outcome = driver
                .run(
                    job_id,
                    record,
                    audio_bytes,
                    context_text.take(),
                    job.prompt.clone(),
                    &job.language,
                    cancel,
                )
                .await?;
            if outcome == ChunkOutcome::Cancelled {
                return Err(PipelineError::Cancelled);
            }
            context_text = trailing_context(&record.segments, self.config.context_segments);
            job.completed_chunks += 1;
            self.store.update_job(&job).await?;
        }

        // Merge and persist the transcript.
        let merged = merge::merge_chunks(
            &records,
            self.config.similarity_threshold,
            self.config.coverage_gap_threshold,
        );
        for warning in &merged.warnings {
            crate::warn!("job {job_id}: {warning}");
        }

        let document = TranscriptDocument {
            job_id: job_id.to_string(),
            duration_seconds: duration,
            provider_used: job.provider.clone(),
            processing_time_seconds: started.elapsed().as_secs_f64(),
            chunks_processed: records.len() as u32,
            transcript: TranscriptBody {
                text: merged.full_text,
                segments: merged.segments,
            },
        };
        let result_key = storage::result_key(job_id);
        let payload = serde_json::to_vec_pretty(&document)
            .map_err(|e| PipelineError::other(format!("transcript serialization failed: {e}")))?;
        self.blobs.put(&result_key, payload).await?;

        // Claim completion first: a job that went CANCELLED while the merge
        // ran must not end up with an addressable result. The orphaned blob
        // is unreachable without the key and goes with the job prefix.
        if !self
            .store
            .transition_job(job_id, &[JobStatus::Processing], JobStatus::Completed)
            .await?
        {
            return Err(PipelineError::Cancelled);
        }
        job.result_key = Some(result_key);
        job.finished_at = Some(Utc::now());
        self.store.update_job(&job).await?;
        crate::info!(
            "job {job_id} completed in {:.1}s",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    fn resolve_api_key(
        &self,
        backend: &dyn TranscriptionBackend,
    ) -> Result<String, PipelineError> {
        if !backend.requires_api_key() {
            return Ok(String::new());
        }
        std::env::var(backend.api_key_env()).map_err(|_| {
            PipelineError::Provider(ProviderError::MissingApiKey {
                provider: backend.display_name().to_string(),
                env_var: backend.api_key_env().to_string(),
            })
        })
    }

    /// Fires the provider-side cancellation token once the store shows the
    /// job CANCELLED (or deleted). The driver's own probes stay
    /// authoritative; this only shortens in-flight HTTP calls.
    fn spawn_cancel_watcher(
        &self,
        job_id: Uuid,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(CANCEL_POLL_INTERVAL_SECS));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match store.get_job(job_id).await {
                    Ok(None) | Ok(Some(Job { status: JobStatus::Cancelled, .. })) => {
                        cancel.cancel();
                        break;
                    }
                    Ok(Some(job)) if job.status.is_terminal() => break,
                    Ok(Some(_)) => {}
                    Err(err) => {
                        crate::verbose!("cancel watcher store read failed: {err}");
                    }
                }
            }
        })
    }

    async fn fail_job(&self, job_id: Uuid, err: &PipelineError) -> Result<(), PipelineError> {
        let code = ErrorCode::classify(err);
        crate::log::failure(job_id, code, err);
        // Transition first: a job that went CANCELLED concurrently must not
        // end up carrying an error code.
        let failed = self
            .store
            .transition_job(
                job_id,
                &[JobStatus::Pending, JobStatus::Uploaded, JobStatus::Processing],
                JobStatus::Failed,
            )
            .await?;
        if !failed {
            return Ok(());
        }
        let Some(mut job) = self.store.get_job(job_id).await? else {
            return Ok(());
        };
        job.error_message = Some(err.to_string());
        job.error_code = Some(code);
        job.finished_at = Some(Utc::now());
        self.store.update_job(&job).await?;
        Ok(())
    }

    /// Request cancellation of a running or queued job. Terminal jobs are
    /// left untouched.
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<bool, PipelineError> {
        let cancelled = self
            .store
            .transition_job(
                job_id,
                &[JobStatus::Pending, JobStatus::Uploaded, JobStatus::Processing],
                JobStatus::Cancelled,
            )
            .await?;
        if cancelled {
            crate::info!("job {job_id} cancellation requested");
        }
        Ok(cancelled)
    }

    /// Re-queue a FAILED job from scratch: error fields cleared, chunk rows
    /// dropped, processing restarts at chunk 0. Completed chunks are not
    /// reused. Cancelled jobs cannot be resumed.
    pub async fn retry_job(
        &self,
        job_id: Uuid,
        queue: &dyn JobQueue,
    ) -> Result<bool, PipelineError> {
        if !self
            .store
            .transition_job(job_id, &[JobStatus::Failed], JobStatus::Pending)
            .await?
        {
            return Ok(false);
        }
        let Some(mut job) = self.store.get_job(job_id).await? else {
            return Ok(false);
        };
        self.store.clear_chunks(job_id).await?;
        job.error_message = None;
        job.error_code = None;
        job.result_key = None;
        job.finished_at = None;
        job.total_chunks = 0;
        job.completed_chunks = 0;
        self.store.update_job(&job).await?;
        queue.push(job_id).await?;
        crate::info!("job {job_id} requeued for retry");
        Ok(true)
    }

    /// Delete a job, its chunk rows, and every blob under its prefix.
    pub async fn delete_job(&self, job_id: Uuid) -> Result<bool, PipelineError> {
        let existed = self.store.delete_job(job_id).await?;
        self.blobs
            .delete_prefix(&storage::job_prefix(job_id))
            .await?;
        Ok(existed)
    }

    /// Fail jobs stuck in UPLOADED/PROCESSING beyond the stale cutoff.
    /// Run at worker start-up so restarts do not leave zombies behind.
    pub async fn recover_stale_jobs(&self) -> Result<usize, PipelineError> {
        let cutoff = Utc::now() - chrono::Duration::minutes(self.config.stale_job_minutes as i64);
        let swept = self.store.mark_stale_jobs(cutoff).await?;
        for job_id in &swept {
            crate::warn!("job {job_id} was stale, marked failed");
        }
        Ok(swept.len())
    }
}
