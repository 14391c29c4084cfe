//! The transcription pipeline: chunk driver, transcript merger, job
//! orchestrator, worker pool.

pub mod driver;
pub mod merge;
mod orchestrator;
pub mod similarity;
mod worker;

pub use driver::{ChunkDriver, ChunkOutcome, coverage_gaps, trailing_context};
pub use merge::{MergeOutput, MergeWarning, MergeWarningKind, merge_chunks};
pub use orchestrator::{JobRequest, Pipeline};
pub use similarity::trigram_jaccard;
pub use worker::WorkerPool;
