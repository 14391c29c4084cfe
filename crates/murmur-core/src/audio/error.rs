//! Audio-specific error types

/// Errors that can occur while normalizing or slicing audio
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// Container format not in the supported audio/video sets
    #[error("unsupported container format: {0:?}")]
    UnsupportedFormat(String),

    /// The decoder rejected the stream
    #[error("audio decode failed: {0}")]
    DecodeFailed(String),

    /// Decoded audio is too short to transcribe
    #[error("audio too short: {0:.2}s")]
    TooShort(f64),

    /// WAV file could not be read or has an unexpected layout
    #[error("malformed WAV: {0}")]
    MalformedWav(String),

    /// I/O error during audio operations
    #[error("audio I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => AudioError::Io(io),
            other => AudioError::MalformedWav(other.to_string()),
        }
    }
}
