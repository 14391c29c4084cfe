//! Immutable pipeline configuration.

use std::str::FromStr;
use std::time::Duration;

use super::defaults::*;
use crate::error::PipelineError;

/// Configuration for the transcription pipeline.
///
/// Read once at worker boot; never mutated afterwards. Runtime state lives in
/// the store, not here.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum chunk duration in seconds.
    pub max_chunk_duration: f64,
    /// Overlap between consecutive chunks in seconds.
    pub overlap_duration: f64,
    /// Coverage gap above which the chunk driver retries a chunk.
    pub coverage_gap_threshold: f64,
    /// Trigram-Jaccard similarity threshold for overlap deduplication (0-1).
    pub similarity_threshold: f64,
    /// Trailing segments of the previous chunk passed as context.
    pub context_segments: usize,
    /// Per-attempt provider call timeout.
    pub provider_timeout: Duration,
    /// Age after which stuck jobs are failed by the start-up sweep.
    pub stale_job_minutes: u64,
    /// Provider attempts per chunk for transient faults.
    pub max_attempts: u32,
    /// Extra attempts allowed for coverage-gap retries.
    pub coverage_retry_limit: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_duration: DEFAULT_MAX_CHUNK_DURATION_SECS,
            overlap_duration: DEFAULT_OVERLAP_DURATION_SECS,
            coverage_gap_threshold: DEFAULT_COVERAGE_GAP_THRESHOLD_SECS,
            similarity_threshold: DEFAULT_OVERLAP_SIMILARITY_THRESHOLD,
            context_segments: DEFAULT_CONTEXT_SEGMENTS,
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            stale_job_minutes: DEFAULT_STALE_JOB_MINUTES,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            coverage_retry_limit: DEFAULT_COVERAGE_RETRY_LIMIT,
        }
    }
}

impl PipelineConfig {
    /// Build a configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables: `MAX_CHUNK_DURATION`, `OVERLAP_DURATION`,
    /// `COVERAGE_GAP_THRESHOLD`, `OVERLAP_SIMILARITY_THRESHOLD`,
    /// `CONTEXT_SEGMENTS`, `PROVIDER_TIMEOUT`, `STALE_JOB_MINUTES`.
    pub fn from_env() -> Result<Self, PipelineError> {
        let mut config = Self {
            max_chunk_duration: env_or("MAX_CHUNK_DURATION", DEFAULT_MAX_CHUNK_DURATION_SECS)?,
            overlap_duration: env_or("OVERLAP_DURATION", DEFAULT_OVERLAP_DURATION_SECS)?,
            coverage_gap_threshold: env_or(
                "COVERAGE_GAP_THRESHOLD",
                DEFAULT_COVERAGE_GAP_THRESHOLD_SECS,
            )?,
            similarity_threshold: env_or(
                "OVERLAP_SIMILARITY_THRESHOLD",
                DEFAULT_OVERLAP_SIMILARITY_THRESHOLD,
            )?,
            context_segments: env_or("CONTEXT_SEGMENTS", DEFAULT_CONTEXT_SEGMENTS)?,
            stale_job_minutes: env_or("STALE_JOB_MINUTES", DEFAULT_STALE_JOB_MINUTES)?,
            ..Self::default()
        };
        let timeout_secs: u64 = env_or("PROVIDER_TIMEOUT", DEFAULT_PROVIDER_TIMEOUT_SECS)?;
        config.provider_timeout = Duration::from_secs(timeout_secs);
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the chunker or merger cannot honor.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_chunk_duration <= 0.0 {
            return Err(PipelineError::config("MAX_CHUNK_DURATION must be positive"));
        }
        if self.overlap_duration < 0.0 || self.overlap_duration >= self.max_chunk_duration {
            return Err(PipelineError::config(
                "OVERLAP_DURATION must be non-negative and smaller than MAX_CHUNK_DURATION",
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(PipelineError::config(
                "OVERLAP_SIMILARITY_THRESHOLD must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, PipelineError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::config(format!("invalid value for {name}: {raw:?}"))),
        Err(_) => Ok(default),
    }
}
