//! Provider-specific error types
//!
//! Every fault coming back from a transcription provider is classified into
//! one of these variants; the chunk driver retries the transient ones and
//! fails the chunk immediately on the rest.

use reqwest::StatusCode;

/// Errors that can occur during transcription provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider pushed back on request rate or concurrency
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The request or its deadline timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Provider rejected our credentials
    #[error("authentication rejected (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// No API key configured for a provider that requires one
    #[error("API key missing for {provider} (set {env_var})")]
    MissingApiKey {
        provider: String,
        env_var: String,
    },

    /// Account quota or billing is exhausted; retrying cannot help
    #[error("quota exhausted: {0}")]
    QuotaExceeded(String),

    /// Provider could not decode the audio we sent
    #[error("audio rejected by provider: {0}")]
    InvalidAudio(String),

    /// Provider-side outage or connection failure
    #[error("provider unavailable{}: {message}", match .status { Some(s) => format!(" (HTTP {s})"), None => String::new() })]
    Unavailable {
        status: Option<u16>,
        message: String,
    },

    /// Response arrived but could not be parsed
    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),

    /// The request's cancellation token fired mid-call
    #[error("transcription cancelled")]
    Cancelled,

    /// Anything else; the raw message bubbles up
    #[error("{0}")]
    Unknown(String),
}

impl ProviderError {
    /// Whether the chunk driver should retry this fault with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Timeout(_) | Self::Unavailable { .. }
        )
    }

    /// Classify a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let lower = body.to_lowercase();
        let excerpt = || format!("HTTP {}: {}", status.as_u16(), body.trim());
        match status.as_u16() {
            401 | 403 => Self::Auth {
                status: status.as_u16(),
                message: body.trim().to_string(),
            },
            402 => Self::QuotaExceeded(excerpt()),
            408 => Self::Timeout(excerpt()),
            429 => {
                // Some providers answer 429 both for rate limiting and for a
                // dead billing account; only the former is worth retrying.
                if lower.contains("quota") || lower.contains("billing") {
                    Self::QuotaExceeded(excerpt())
                } else {
                    Self::RateLimited(excerpt())
                }
            }
            400 | 415 | 422 => {
                if lower.contains("audio") || lower.contains("decod") || lower.contains("format") {
                    Self::InvalidAudio(excerpt())
                } else {
                    Self::Unknown(excerpt())
                }
            }
            500..=599 => Self::Unavailable {
                status: Some(status.as_u16()),
                message: body.trim().to_string(),
            },
            _ => Self::Unknown(excerpt()),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_connect() {
            ProviderError::Unavailable {
                status: None,
                message: format!("connection failed: {err}"),
            }
        } else if let Some(status) = err.status() {
            ProviderError::from_status(status, &err.to_string())
        } else {
            ProviderError::Unknown(err.to_string())
        }
    }
}
