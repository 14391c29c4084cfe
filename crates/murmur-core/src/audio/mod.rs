//! Binary-audio handling: normalization, silence detection, chunking.

pub mod chunker;
mod error;
pub mod normalize;
pub mod silence;
pub mod wav;

pub use chunker::{ChunkSpan, ChunkerConfig, CutChunk, cut_chunks, plan_chunks};
pub use error::AudioError;
pub use normalize::{NormalizedAudio, normalize};
pub use silence::{SilenceRegion, detect_silence};
pub use wav::{TARGET_SAMPLE_RATE, WavData};
