//! Default values for the pipeline configuration.
//!
//! Every knob here can be overridden through the environment variable of the
//! same name (see `PipelineConfig::from_env`). When changing a default, keep
//! the doc comment's rationale current.

/// Default maximum chunk duration in seconds (`MAX_CHUNK_DURATION`).
///
/// Five minutes keeps each provider request comfortably under upload size
/// limits while giving the model enough context for consistent style.
pub const DEFAULT_MAX_CHUNK_DURATION_SECS: f64 = 300.0;

/// Default overlap between consecutive chunks in seconds (`OVERLAP_DURATION`).
///
/// The overlap is transcribed twice on purpose; the merger deduplicates it.
/// Ten seconds is enough for a sentence to land fully inside both chunks.
pub const DEFAULT_OVERLAP_DURATION_SECS: f64 = 10.0;

/// Default coverage gap threshold in seconds (`COVERAGE_GAP_THRESHOLD`).
///
/// If a provider's first segment starts later than this (or its last segment
/// ends earlier than this before the chunk end), the chunk driver assumes the
/// model skipped audio and retries the chunk.
pub const DEFAULT_COVERAGE_GAP_THRESHOLD_SECS: f64 = 15.0;

/// Default trigram-Jaccard similarity threshold for overlap deduplication
/// (`OVERLAP_SIMILARITY_THRESHOLD`).
pub const DEFAULT_OVERLAP_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Default number of trailing segments of the previous chunk passed as
/// context to the next chunk's transcription request (`CONTEXT_SEGMENTS`).
pub const DEFAULT_CONTEXT_SEGMENTS: usize = 3;

/// Default per-attempt provider call timeout in seconds (`PROVIDER_TIMEOUT`).
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;

/// Default age in minutes after which a job stuck in UPLOADED or PROCESSING
/// is presumed abandoned and failed by the start-up sweep (`STALE_JOB_MINUTES`).
pub const DEFAULT_STALE_JOB_MINUTES: u64 = 30;

/// Default number of provider attempts per chunk for transient faults.
///
/// Coverage-gap retries are budgeted separately (see
/// [`DEFAULT_COVERAGE_RETRY_LIMIT`]).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default number of extra attempts allowed when a chunk result fails
/// coverage validation.
pub const DEFAULT_COVERAGE_RETRY_LIMIT: u32 = 2;

/// Base delay for exponential backoff between transient-fault retries.
pub const DEFAULT_RETRY_BASE_DELAY_SECS: u64 = 2;

/// Cap on the backoff delay between transient-fault retries.
pub const DEFAULT_RETRY_MAX_DELAY_SECS: u64 = 60;

/// How often the cancellation watcher re-reads the job row while a chunk is
/// in flight. The driver also probes at every chunk start and before every
/// retry sleep; the watcher only exists to fire the provider-side
/// cancellation token early.
pub const CANCEL_POLL_INTERVAL_SECS: u64 = 2;
