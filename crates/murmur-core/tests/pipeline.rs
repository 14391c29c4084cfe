//! End-to-end pipeline tests over the in-memory store/queue, a temp-dir
//! blob store, and scripted provider backends.
//!
//! Audio fixtures are mono 16-kHz WAVs generated with hound, so the
//! normalizer takes its passthrough path and no external decoder is needed.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use murmur_core::job::store::JobStore;
use murmur_core::{
    ChunkStatus, ChunkTranscription, ErrorCode, InMemoryQueue, Job, JobQueue, JobRequest,
    JobStatus, LocalBlobStore, MemoryJobStore, Pipeline, PipelineConfig, ProviderError,
    ProviderMetadata, ProviderRegistry, Segment, TranscriptDocument, TranscriptionBackend,
    TranscriptionRequest, WorkerPool,
};

const RATE: u32 = 16_000;

/// Write `secs` of tone as a mono 16-kHz WAV the normalizer passes through.
fn write_tone_wav(path: &Path, secs: f64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..(secs * RATE as f64) as usize {
        let sample = ((i as f32 * 0.3).sin() * 12_000.0) as i16;
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

type ScriptFn =
    dyn Fn(u32, &TranscriptionRequest) -> Result<ChunkTranscription, ProviderError> + Send + Sync;

/// Test backend driven by a closure over (call number, request).
struct ScriptedBackend {
    calls: AtomicU32,
    requests: Mutex<Vec<(u32, Option<String>)>>,
    script: Box<ScriptFn>,
}

impl ScriptedBackend {
    fn new(script: Box<ScriptFn>) -> Self {
        Self {
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
            script,
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn display_name(&self) -> &'static str {
        "Scripted Stub"
    }

    fn api_key_env(&self) -> &'static str {
        "STUB_API_KEY"
    }

    fn requires_api_key(&self) -> bool {
        false
    }

    async fn transcribe(
        &self,
        _client: &reqwest::Client,
        _api_key: &str,
        request: TranscriptionRequest,
    ) -> Result<ChunkTranscription, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((request.chunk_index, request.context_text.clone()));
        (self.script)(call, &request)
    }
}

fn segments_result(segments: Vec<Segment>) -> Result<ChunkTranscription, ProviderError> {
    Ok(ChunkTranscription {
        segments,
        metadata: ProviderMetadata {
            model: "stub-1".into(),
            latency_ms: 5,
            ..Default::default()
        },
    })
}

struct Harness {
    pipeline: Arc<Pipeline>,
    queue: Arc<InMemoryQueue>,
    store: Arc<MemoryJobStore>,
    blobs: Arc<LocalBlobStore>,
    backend: Arc<ScriptedBackend>,
    _blob_dir: tempfile::TempDir,
    audio_dir: tempfile::TempDir,
}

fn harness(config: PipelineConfig, script: Box<ScriptFn>) -> Harness {
    let store = Arc::new(MemoryJobStore::new());
    let blob_dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(LocalBlobStore::new(blob_dir.path()));
    let backend = Arc::new(ScriptedBackend::new(script));

    let mut registry = ProviderRegistry::new();
    registry.register(backend.clone());

    let pipeline = Arc::new(
        Pipeline::with_registry(
            store.clone(),
            blobs.clone(),
            config,
            Arc::new(registry),
        )
        .unwrap(),
    );
    Harness {
        pipeline,
        queue: Arc::new(InMemoryQueue::new()),
        store,
        blobs,
        backend,
        _blob_dir: blob_dir,
        audio_dir: tempfile::tempdir().unwrap(),
    }
}

impl Harness {
    async fn submit_tone(&self, secs: f64) -> Job {
        let path = self.audio_dir.path().join("input.wav");
        write_tone_wav(&path, secs);
        self.pipeline
            .submit(
                &path,
                JobRequest {
                    provider: "stub".into(),
                    language: "en".into(),
                    prompt: None,
                    webhook_url: None,
                },
            )
            .await
            .unwrap()
    }

    async fn run_to_completion(&self, job: &Job) {
        self.queue.push(job.id).await.unwrap();
        self.queue.close();
        WorkerPool::new(self.pipeline.clone(), self.queue.clone())
            .run(1)
            .await
            .unwrap();
    }

    async fn job(&self, id: uuid::Uuid) -> Job {
        self.store.get_job(id).await.unwrap().unwrap()
    }

    async fn transcript(&self, job: &Job) -> TranscriptDocument {
        let stored = self.job(job.id).await;
        let key = stored.result_key.expect("job has no result key");
        let bytes = murmur_core::BlobStore::get(self.blobs.as_ref(), &key)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}

#[tokio::test]
async fn short_audio_single_chunk() {
    let h = harness(
        PipelineConfig::default(),
        Box::new(|_, request| {
            segments_result(vec![
                Segment::new(0.4, 14.0, "thanks everyone for joining"),
                Segment::new(14.2, request.chunk_duration - 0.5, "let us get started"),
            ])
        }),
    );
    let job = h.submit_tone(30.0).await;
    h.run_to_completion(&job).await;

    let stored = h.job(job.id).await;
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.total_chunks, 1);
    assert_eq!(stored.completed_chunks, 1);
    assert!((stored.duration_seconds.unwrap() - 30.0).abs() < 0.05);
    assert!(stored.error_code.is_none());
    assert!(stored.finished_at.is_some());

    let doc = h.transcript(&job).await;
    assert_eq!(doc.job_id, job.id.to_string());
    assert_eq!(doc.chunks_processed, 1);
    assert_eq!(doc.provider_used, "stub");
    // Segments cover at least 90% of the audio.
    let covered: f64 = doc
        .transcript
        .segments
        .iter()
        .map(|s| s.end - s.start)
        .sum();
    assert!(covered >= 0.9 * doc.duration_seconds);
    assert_eq!(
        doc.transcript.text,
        "thanks everyone for joining let us get started"
    );
}

#[tokio::test]
async fn chunk_blobs_follow_key_layout() {
    let h = harness(
        PipelineConfig {
            max_chunk_duration: 30.0,
            overlap_duration: 2.0,
            ..PipelineConfig::default()
        },
        Box::new(|_, request| {
            segments_result(vec![Segment::new(
                0.1,
                request.chunk_duration - 0.1,
                "steady narration",
            )])
        }),
    );
    let job = h.submit_tone(65.0).await;
    h.run_to_completion(&job).await;

    let stored = h.job(job.id).await;
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.total_chunks, 3);

    for index in 0..3u32 {
        let key = format!("jobs/{}/chunks/chunk-{index:04}.wav", job.id);
        assert!(
            murmur_core::BlobStore::get(h.blobs.as_ref(), &key).await.is_ok(),
            "missing chunk blob {key}"
        );
    }
    assert!(
        murmur_core::BlobStore::get(
            h.blobs.as_ref(),
            &format!("jobs/{}/result/transcript.json", job.id)
        )
        .await
        .is_ok()
    );
}

#[tokio::test]
async fn context_is_injected_sequentially() {
    let h = harness(
        PipelineConfig {
            max_chunk_duration: 30.0,
            overlap_duration: 2.0,
            context_segments: 2,
            ..PipelineConfig::default()
        },
        Box::new(|_, request| {
            let base = format!("chunk {} narration", request.chunk_index);
            segments_result(vec![
                Segment::new(0.1, 5.0, format!("{base} part one")),
                Segment::new(5.0, 10.0, format!("{base} part two")),
                Segment::new(10.0, request.chunk_duration - 0.1, format!("{base} part three")),
            ])
        }),
    );
    let job = h.submit_tone(65.0).await;
    h.run_to_completion(&job).await;
    assert_eq!(h.job(job.id).await.status, JobStatus::Completed);

    let requests = h.backend.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0], (0, None));
    // Chunk N+1 sees the trailing two segments of chunk N.
    assert_eq!(
        requests[1],
        (
            1,
            Some("chunk 0 narration part two chunk 0 narration part three".into())
        )
    );
    assert_eq!(
        requests[2],
        (
            2,
            Some("chunk 1 narration part two chunk 1 narration part three".into())
        )
    );
}

#[tokio::test(start_paused = true)]
async fn coverage_gap_triggers_bounded_retries() {
    // Attempt 1 starts 16s late; attempt 2 is clean. The driver must take
    // attempt 2 and stop retrying.
    let h = harness(
        PipelineConfig::default(),
        Box::new(|call, request| {
            if call == 0 {
                segments_result(vec![Segment::new(16.0, request.chunk_duration, "late")])
            } else {
                segments_result(vec![Segment::new(
                    0.2,
                    request.chunk_duration - 0.2,
                    "clean transcription",
                )])
            }
        }),
    );
    let job = h.submit_tone(30.0).await;
    h.run_to_completion(&job).await;

    assert_eq!(h.backend.call_count(), 2);
    let stored = h.job(job.id).await;
    assert_eq!(stored.status, JobStatus::Completed);
    let chunks = h.store.get_chunks(job.id).await.unwrap();
    assert_eq!(chunks[0].attempt_count, 2);
    assert_eq!(chunks[0].segments[0].text, "clean transcription");
}

#[tokio::test(start_paused = true)]
async fn coverage_retries_keep_best_attempt() {
    // All three attempts are bad; the budget is 2 extra attempts and the
    // smallest max-gap result (attempt 2, 18s) must win.
    let h = harness(
        PipelineConfig::default(),
        Box::new(|call, request| {
            let start = match call {
                0 => 20.0,
                1 => 18.0,
                _ => 25.0,
            };
            segments_result(vec![Segment::new(start, request.chunk_duration, "gappy")])
        }),
    );
    let job = h.submit_tone(30.0).await;
    h.run_to_completion(&job).await;

    assert_eq!(h.backend.call_count(), 3);
    let stored = h.job(job.id).await;
    // Coverage gaps degrade quality but never fail the job.
    assert_eq!(stored.status, JobStatus::Completed);
    let chunks = h.store.get_chunks(job.id).await.unwrap();
    assert_eq!(chunks[0].segments[0].start, 18.0);
}

#[tokio::test(start_paused = true)]
async fn transient_faults_are_retried_with_backoff() {
    let h = harness(
        PipelineConfig::default(),
        Box::new(|call, request| {
            if call < 2 {
                Err(ProviderError::RateLimited("slow down".into()))
            } else {
                segments_result(vec![Segment::new(
                    0.1,
                    request.chunk_duration - 0.1,
                    "eventually fine",
                )])
            }
        }),
    );
    let job = h.submit_tone(30.0).await;
    h.run_to_completion(&job).await;

    assert_eq!(h.backend.call_count(), 3);
    let stored = h.job(job.id).await;
    assert_eq!(stored.status, JobStatus::Completed);
    let chunks = h.store.get_chunks(job.id).await.unwrap();
    assert_eq!(chunks[0].attempt_count, 3);
    assert_eq!(chunks[0].status, ChunkStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn transient_faults_exhaust_and_fail_the_job() {
    let h = harness(
        PipelineConfig::default(),
        Box::new(|_, _| Err(ProviderError::Unavailable {
            status: Some(503),
            message: "upstream down".into(),
        })),
    );
    let job = h.submit_tone(30.0).await;
    h.run_to_completion(&job).await;

    assert_eq!(h.backend.call_count(), 3);
    let stored = h.job(job.id).await;
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error_code, Some(ErrorCode::ProviderUnavailable));
    assert!(stored.error_message.unwrap().contains("upstream down"));
    let chunks = h.store.get_chunks(job.id).await.unwrap();
    assert_eq!(chunks[0].status, ChunkStatus::Failed);
}

#[tokio::test]
async fn auth_error_fails_immediately() {
    let h = harness(
        PipelineConfig::default(),
        Box::new(|_, _| Err(ProviderError::Auth {
            status: 401,
            message: "invalid key".into(),
        })),
    );
    let job = h.submit_tone(30.0).await;
    h.run_to_completion(&job).await;

    assert_eq!(h.backend.call_count(), 1);
    let stored = h.job(job.id).await;
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error_code, Some(ErrorCode::AuthError));
}

#[tokio::test]
async fn invalid_audio_is_rejected_before_any_provider_call() {
    let h = harness(PipelineConfig::default(), Box::new(|_, _| {
        panic!("provider must not be called for invalid audio")
    }));
    // 0.05s of audio is under the minimum duration.
    let job = h.submit_tone(0.05).await;
    h.run_to_completion(&job).await;

    let stored = h.job(job.id).await;
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error_code, Some(ErrorCode::InvalidAudio));
    assert_eq!(h.backend.call_count(), 0);
}

#[tokio::test]
async fn cancellation_mid_job_stops_later_chunks() {
    // Three chunks; the job is cancelled while chunk 1's provider call is in
    // flight. Chunk 0 stays completed, chunk 1's result is discarded, chunk
    // 2 is never started.
    let store = Arc::new(MemoryJobStore::new());
    let blob_dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(LocalBlobStore::new(blob_dir.path()));

    struct MidJobCancel {
        store: Arc<MemoryJobStore>,
        job_id: Mutex<Option<uuid::Uuid>>,
    }

    #[async_trait]
    impl TranscriptionBackend for MidJobCancel {
        fn name(&self) -> &'static str {
            "stub"
        }
        fn display_name(&self) -> &'static str {
            "Mid-job Cancel Stub"
        }
        fn api_key_env(&self) -> &'static str {
            "STUB_API_KEY"
        }
        fn requires_api_key(&self) -> bool {
            false
        }

        async fn transcribe(
            &self,
            _client: &reqwest::Client,
            _api_key: &str,
            request: TranscriptionRequest,
        ) -> Result<ChunkTranscription, ProviderError> {
            if request.chunk_index == 1 {
                let job_id = self.job_id.lock().unwrap().unwrap();
                assert!(
                    self.store
                        .transition_job(
                            job_id,
                            &[JobStatus::Processing],
                            JobStatus::Cancelled,
                        )
                        .await
                        .unwrap()
                );
            }
            Ok(ChunkTranscription {
                segments: vec![Segment::new(0.1, request.chunk_duration - 0.1, "speech")],
                metadata: ProviderMetadata::default(),
            })
        }
    }

    let backend = Arc::new(MidJobCancel {
        store: store.clone(),
        job_id: Mutex::new(None),
    });
    let mut registry = ProviderRegistry::new();
    registry.register(backend.clone());
    let pipeline = Arc::new(
        Pipeline::with_registry(
            store.clone(),
            blobs.clone(),
            PipelineConfig {
                max_chunk_duration: 30.0,
                overlap_duration: 2.0,
                ..PipelineConfig::default()
            },
            Arc::new(registry),
        )
        .unwrap(),
    );

    let audio_dir = tempfile::tempdir().unwrap();
    let path = audio_dir.path().join("input.wav");
    write_tone_wav(&path, 65.0);
    let job = pipeline
        .submit(
            &path,
            JobRequest {
                provider: "stub".into(),
                language: "en".into(),
                prompt: None,
                webhook_url: None,
            },
        )
        .await
        .unwrap();
    *backend.job_id.lock().unwrap() = Some(job.id);

    pipeline.process_job(job.id).await.unwrap();

    let stored = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Cancelled);
    assert!(stored.result_key.is_none());

    let chunks = store.get_chunks(job.id).await.unwrap();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].status, ChunkStatus::Completed);
    // In-flight result discarded: the chunk row never reached COMPLETED.
    assert_ne!(chunks[1].status, ChunkStatus::Completed);
    // No chunk after the cancel was ever started.
    assert_eq!(chunks[2].status, ChunkStatus::Pending);
    assert_eq!(chunks[2].attempt_count, 0);
}

#[tokio::test]
async fn failed_job_retry_restarts_from_chunk_zero() {
    // First pass fails with a quota error; after retry_job the stub
    // succeeds and the job restarts from scratch.
    let h = harness(
        PipelineConfig::default(),
        Box::new(|call, request| {
            if call == 0 {
                Err(ProviderError::QuotaExceeded("billing hard stop".into()))
            } else {
                segments_result(vec![Segment::new(
                    0.1,
                    request.chunk_duration - 0.1,
                    "second time lucky",
                )])
            }
        }),
    );
    let job = h.submit_tone(30.0).await;
    h.pipeline.process_job(job.id).await.unwrap();

    let failed = h.job(job.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_code, Some(ErrorCode::QuotaExceeded));

    assert!(
        h.pipeline
            .retry_job(job.id, h.queue.as_ref())
            .await
            .unwrap()
    );
    let retried = h.job(job.id).await;
    assert_eq!(retried.status, JobStatus::Pending);
    assert!(retried.error_code.is_none());
    assert!(retried.error_message.is_none());
    assert_eq!(retried.completed_chunks, 0);

    h.queue.close();
    WorkerPool::new(h.pipeline.clone(), h.queue.clone())
        .run(1)
        .await
        .unwrap();

    let done = h.job(job.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    let doc = h.transcript(&job).await;
    assert_eq!(doc.transcript.text, "second time lucky");
}

#[tokio::test]
async fn cancelled_job_cannot_be_retried() {
    let h = harness(PipelineConfig::default(), Box::new(|_, _| {
        Err(ProviderError::Unknown("unused".into()))
    }));
    let job = h.submit_tone(30.0).await;
    assert!(h.pipeline.cancel_job(job.id).await.unwrap());
    assert!(
        !h.pipeline
            .retry_job(job.id, h.queue.as_ref())
            .await
            .unwrap()
    );
    assert_eq!(h.job(job.id).await.status, JobStatus::Cancelled);
}

#[tokio::test]
async fn delete_job_removes_rows_and_blobs() {
    let h = harness(
        PipelineConfig::default(),
        Box::new(|_, request| {
            segments_result(vec![Segment::new(0.1, request.chunk_duration - 0.1, "text")])
        }),
    );
    let job = h.submit_tone(30.0).await;
    h.run_to_completion(&job).await;
    let result_key = h.job(job.id).await.result_key.unwrap();

    assert!(h.pipeline.delete_job(job.id).await.unwrap());
    assert!(h.store.get_job(job.id).await.unwrap().is_none());
    assert!(h.store.get_chunks(job.id).await.unwrap().is_empty());
    assert!(
        murmur_core::BlobStore::get(h.blobs.as_ref(), &result_key)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn unknown_provider_fails_with_unknown_code() {
    let h = harness(PipelineConfig::default(), Box::new(|_, _| {
        Err(ProviderError::Unknown("unused".into()))
    }));
    let path = h.audio_dir.path().join("input.wav");
    write_tone_wav(&path, 5.0);
    let job = h
        .pipeline
        .submit(
            &path,
            JobRequest {
                provider: "no-such-provider".into(),
                language: "en".into(),
                prompt: None,
                webhook_url: None,
            },
        )
        .await
        .unwrap();
    h.pipeline.process_job(job.id).await.unwrap();

    let stored = h.job(job.id).await;
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.error_code, Some(ErrorCode::Unknown));
}
