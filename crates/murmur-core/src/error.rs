//! Unified error types for murmur-core
//!
//! # Error Hierarchy
//!
//! ```text
//! PipelineError
//!   ├── Audio(AudioError)       - Decoding, normalization, chunk extraction
//!   ├── Provider(ProviderError) - Transcription provider errors
//!   ├── Store(StoreError)       - Job/chunk store errors
//!   ├── Storage(StorageError)   - Blob storage errors
//!   ├── Cancelled               - Job cancelled or deleted mid-flight
//!   ├── Config(String)          - Configuration errors
//!   └── Io(std::io::Error)      - Generic I/O errors
//! ```
//!
//! `ErrorCode` is the classified failure code persisted on a FAILED job.
//! The classifier runs once, at job-failure time, over the `PipelineError`
//! that killed the job; the raw error text is stored alongside it.

use serde::{Deserialize, Serialize};

pub use crate::audio::AudioError;
pub use crate::job::queue::QueueError;
pub use crate::job::store::StoreError;
pub use crate::provider::ProviderError;
pub use crate::storage::StorageError;

/// Top-level error type for pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Audio-related errors (normalization, chunk extraction)
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Provider-related errors (transcription, API keys)
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Job/chunk store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Blob storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Queue errors
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// The job was cancelled or deleted while being processed
    #[error("job cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Convenience result type using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Classified failure code stored on a FAILED job.
///
/// Retryable codes are consumed inside the chunk driver; by the time a code
/// lands on a job row its retry budget is already spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    RateLimited,
    Timeout,
    ProviderUnavailable,
    AuthError,
    QuotaExceeded,
    InvalidAudio,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::AuthError => "auth_error",
            Self::QuotaExceeded => "quota_exceeded",
            Self::InvalidAudio => "invalid_audio",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the underlying fault was transient (informational; the driver
    /// has already exhausted its retry budget when this code is stored).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout | Self::ProviderUnavailable
        )
    }

    /// Map a pipeline error to its failure code.
    pub fn classify(err: &PipelineError) -> Self {
        match err {
            PipelineError::Provider(p) => match p {
                ProviderError::RateLimited(_) => Self::RateLimited,
                ProviderError::Timeout(_) => Self::Timeout,
                ProviderError::Unavailable { .. } => Self::ProviderUnavailable,
                ProviderError::Auth { .. } | ProviderError::MissingApiKey { .. } => {
                    Self::AuthError
                }
                ProviderError::QuotaExceeded(_) => Self::QuotaExceeded,
                ProviderError::InvalidAudio(_) => Self::InvalidAudio,
                ProviderError::InvalidResponse(_)
                | ProviderError::Cancelled
                | ProviderError::Unknown(_) => Self::Unknown,
            },
            PipelineError::Audio(_) => Self::InvalidAudio,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
