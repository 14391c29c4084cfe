//! Job and chunk data model.
//!
//! A `Job` exclusively owns its `ChunkRecord`s (cascade delete); segments are
//! value objects embedded in chunk rows; the final `TranscriptDocument` is a
//! derived projection stored separately in blob storage.

pub mod queue;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorCode;

/// Lifecycle of a transcription job.
///
/// COMPLETED, FAILED and CANCELLED are terminal: once a job reaches one of
/// them it never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Uploaded,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Lifecycle of a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ChunkStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A transcription job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub original_filename: String,
    pub size_bytes: u64,
    /// Lowercased file extension of the uploaded artifact.
    pub extension: String,
    /// Blob key of the uploaded artifact.
    pub source_key: String,
    /// Registered provider name, e.g. "openai".
    pub provider: String,
    /// BCP-47 language tag, e.g. "en".
    pub language: String,
    /// Optional user prompt forwarded to the provider.
    pub prompt: Option<String>,
    /// Optional webhook notified by the intake surface on completion.
    pub webhook_url: Option<String>,
    /// Total duration in seconds, discovered during normalization.
    pub duration_seconds: Option<f64>,
    pub status: JobStatus,
    pub total_chunks: u32,
    pub completed_chunks: u32,
    /// Raw error text of the failure, if any.
    pub error_message: Option<String>,
    /// Classified failure code; set iff status is FAILED.
    pub error_code: Option<ErrorCode>,
    /// Blob key of the final transcript JSON.
    pub result_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new PENDING job for an artifact already present in blob
    /// storage under `source_key`.
    pub fn new(params: NewJob) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            original_filename: params.original_filename,
            size_bytes: params.size_bytes,
            extension: params.extension.to_lowercase(),
            source_key: params.source_key,
            provider: params.provider,
            language: params.language,
            prompt: params.prompt,
            webhook_url: params.webhook_url,
            duration_seconds: None,
            status: JobStatus::Pending,
            total_chunks: 0,
            completed_chunks: 0,
            error_message: None,
            error_code: None,
            result_key: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }
}

/// Parameters for creating a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub original_filename: String,
    pub size_bytes: u64,
    pub extension: String,
    pub source_key: String,
    pub provider: String,
    pub language: String,
    pub prompt: Option<String>,
    pub webhook_url: Option<String>,
}

/// A timestamped piece of transcribed speech.
///
/// Inside a chunk row the timestamps are chunk-local; in the final transcript
/// they are absolute (job-global). Field names match the transcript JSON
/// schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub speaker: Option<String>,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            speaker: None,
        }
    }
}

/// Provider-reported metadata for one chunk transcription.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub model: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub latency_ms: u64,
    pub finish_reason: Option<String>,
    /// Response body excerpt kept for debugging, truncated at source.
    pub raw_response: String,
}

/// One chunk of a job's audio, identified by (job_id, index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub job_id: Uuid,
    pub index: u32,
    /// Absolute start time in seconds.
    pub start_time: f64,
    /// Absolute end time in seconds.
    pub end_time: f64,
    /// Blob key of the chunk WAV.
    pub storage_key: String,
    pub status: ChunkStatus,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    /// Chunk-local segments from the accepted provider result.
    pub segments: Vec<Segment>,
    pub metadata: Option<ProviderMetadata>,
}

impl ChunkRecord {
    pub fn new(job_id: Uuid, index: u32, start_time: f64, end_time: f64, storage_key: String) -> Self {
        Self {
            job_id,
            index,
            start_time,
            end_time,
            storage_key,
            status: ChunkStatus::Pending,
            attempt_count: 0,
            last_error: None,
            segments: Vec::new(),
            metadata: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// The persisted transcript, in the normative JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptDocument {
    pub job_id: String,
    pub duration_seconds: f64,
    pub provider_used: String,
    pub processing_time_seconds: f64,
    pub chunks_processed: u32,
    pub transcript: TranscriptBody,
}

/// The transcript payload: ordered absolute segments plus concatenated text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptBody {
    pub text: String,
    pub segments: Vec<Segment>,
}
