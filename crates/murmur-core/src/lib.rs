// Domain modules (organized by concern)
pub mod audio;
pub mod configuration;
pub mod job;
pub mod pipeline;
pub mod provider;
pub mod storage;

// Utility modules (cross-cutting concerns)
pub mod error;
pub mod log;

// Re-export audio types
pub use audio::{AudioError, ChunkSpan, ChunkerConfig, NormalizedAudio, SilenceRegion};

// Re-export configuration types
pub use configuration::PipelineConfig;

// Re-export job model types
pub use job::queue::{InMemoryQueue, JobQueue, QueueError};
pub use job::store::{JobStore, MemoryJobStore, StoreError};
pub use job::{
    ChunkRecord, ChunkStatus, Job, JobStatus, NewJob, ProviderMetadata, Segment, TranscriptBody,
    TranscriptDocument,
};

// Re-export provider types
pub use provider::{
    ChunkTranscription, ProviderError, ProviderRegistry, RetryConfig, TranscriptionBackend,
    TranscriptionRequest, registry,
};

// Re-export pipeline types
pub use pipeline::{
    ChunkOutcome, JobRequest, MergeOutput, MergeWarning, Pipeline, WorkerPool, merge_chunks,
};

// Re-export other utility types
pub use error::{ErrorCode, PipelineError};
pub use storage::{BlobStore, LocalBlobStore, StorageError};
pub use log::set_verbose;
