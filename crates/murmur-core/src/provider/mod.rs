//! Transcription Provider Module
//!
//! Extensible architecture for speech-to-text providers. All providers
//! implement the `TranscriptionBackend` trait and are looked up by name in
//! the `ProviderRegistry`.
//!
//! # Architecture
//!
//! ```text
//! Provider System
//!   ├── Registry     - Provider lookup by name
//!   ├── Base         - Shared HTTP logic (OpenAI-compatible APIs) + retry policy
//!   └── Providers    - Individual provider implementations
//!       ├── OpenAI-compatible - OpenAI, Groq, Mistral
//!       └── Custom format     - Deepgram
//! ```
//!
//! # Adding a New Provider
//!
//! 1. Create a new file in `provider/` (e.g., `myprovider.rs`)
//! 2. Implement `TranscriptionBackend`
//! 3. Register it in `ProviderRegistry::new()`
//!
//! The chunk driver never changes when a provider is added.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::job::{ProviderMetadata, Segment};

mod base;
mod deepgram;
pub mod error;
mod groq;
mod mistral;
mod openai;

pub use base::retry::RetryConfig;
pub use deepgram::DeepgramProvider;
pub use error::ProviderError;
pub use groq::GroqProvider;
pub use mistral::MistralProvider;
pub use openai::OpenAIProvider;

pub(crate) use base::openai_compatible_transcribe;

/// Cap on the raw response excerpt kept in chunk metadata for debugging.
pub const RAW_RESPONSE_CAP_BYTES: usize = 2048;

/// Request data for transcribing one chunk
#[derive(Clone)]
pub struct TranscriptionRequest {
    /// WAV bytes of the chunk, overlap included.
    pub audio_data: Vec<u8>,
    /// BCP-47 language tag, e.g. "en".
    pub language: String,
    /// Optional user-supplied prompt for vocabulary/style hints.
    pub prompt: Option<String>,
    /// Trailing text of the previous chunk, injected for continuity.
    pub context_text: Option<String>,
    pub chunk_index: u32,
    pub chunk_duration: f64,
    /// Fired when the job is cancelled; providers abort best-effort.
    pub cancel: CancellationToken,
}

impl TranscriptionRequest {
    pub fn filename(&self) -> String {
        format!("chunk-{:04}.wav", self.chunk_index)
    }
}

/// Result of transcribing one chunk
#[derive(Debug, Clone)]
pub struct ChunkTranscription {
    /// Segments with chunk-local timestamps in seconds.
    pub segments: Vec<Segment>,
    pub metadata: ProviderMetadata,
}

/// Trait for transcription providers
///
/// Implement this trait to add a new transcription provider.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Unique identifier for this provider (e.g., "openai", "deepgram")
    fn name(&self) -> &'static str;

    /// Display name for logs and errors (e.g., "OpenAI Whisper")
    fn display_name(&self) -> &'static str;

    /// Environment variable holding this provider's API key
    fn api_key_env(&self) -> &'static str;

    /// Whether the provider needs an API key (test stubs override this)
    fn requires_api_key(&self) -> bool {
        true
    }

    /// Transcribe one chunk of audio.
    ///
    /// Timestamps in the returned segments must be chunk-local seconds,
    /// regardless of the provider's native scale.
    async fn transcribe(
        &self,
        client: &reqwest::Client,
        api_key: &str,
        request: TranscriptionRequest,
    ) -> Result<ChunkTranscription, ProviderError>;
}

/// Build the instruction prompt sent upstream.
///
/// The wording matters: the model must transcribe everything from 0.0,
/// including audio that repeats the injected context. A previous "do not
/// repeat the context" instruction caused multi-second skips at chunk
/// starts; the merger owns deduplication, not the model.
pub(crate) fn build_prompt(request: &TranscriptionRequest) -> String {
    let mut prompt = String::from(
        "Transcribe the complete audio from the very beginning (timestamp 0.0) \
         to the end. Include everything that is said, even speech that repeats \
         earlier material.",
    );
    if let Some(user_prompt) = &request.prompt {
        prompt.push(' ');
        prompt.push_str(user_prompt);
    }
    if let Some(context) = &request.context_text {
        prompt.push_str(" The previous part ended with: ");
        prompt.push_str(context);
    }
    prompt
}

/// Truncate a raw response body to the debugging cap on a char boundary.
pub(crate) fn truncate_raw(body: &str) -> String {
    if body.len() <= RAW_RESPONSE_CAP_BYTES {
        return body.to_string();
    }
    let mut cut = RAW_RESPONSE_CAP_BYTES;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body[..cut].to_string()
}

/// Registry of all available transcription providers
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn TranscriptionBackend>>,
}

impl ProviderRegistry {
    /// Create registry with all built-in providers
    pub fn new() -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
        };
        registry.register(Arc::new(OpenAIProvider));
        registry.register(Arc::new(GroqProvider));
        registry.register(Arc::new(MistralProvider));
        registry.register(Arc::new(DeepgramProvider));
        registry
    }

    /// Register a provider under its own name
    pub fn register(&mut self, backend: Arc<dyn TranscriptionBackend>) {
        self.providers.insert(backend.name(), backend);
    }

    /// Get a provider by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn TranscriptionBackend>> {
        self.providers.get(name).cloned()
    }

    /// List all provider names, sorted
    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the global provider registry
pub fn registry() -> &'static ProviderRegistry {
    static REGISTRY: OnceLock<ProviderRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ProviderRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_builtin_providers() {
        let registry = ProviderRegistry::new();
        assert_eq!(
            registry.list(),
            vec!["deepgram", "groq", "mistral", "openai"]
        );
        assert!(registry.get("openai").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_prompt_never_tells_model_to_skip() {
        let request = TranscriptionRequest {
            audio_data: Vec::new(),
            language: "en".into(),
            prompt: Some("Names: Anna, Priya.".into()),
            context_text: Some("see you next week".into()),
            chunk_index: 3,
            chunk_duration: 300.0,
            cancel: CancellationToken::new(),
        };
        let prompt = build_prompt(&request);
        assert!(prompt.contains("timestamp 0.0"));
        assert!(prompt.contains("even speech that repeats"));
        assert!(prompt.contains("Names: Anna, Priya."));
        assert!(prompt.contains("see you next week"));
        assert!(!prompt.to_lowercase().contains("do not repeat"));
    }

    #[test]
    fn test_truncate_raw_respects_char_boundaries() {
        let body = "ü".repeat(RAW_RESPONSE_CAP_BYTES);
        let cut = truncate_raw(&body);
        assert!(cut.len() <= RAW_RESPONSE_CAP_BYTES);
        assert!(cut.chars().all(|c| c == 'ü'));

        let short = "tiny";
        assert_eq!(truncate_raw(short), "tiny");
    }

    #[test]
    fn test_request_filename() {
        let request = TranscriptionRequest {
            audio_data: Vec::new(),
            language: "en".into(),
            prompt: None,
            context_text: None,
            chunk_index: 12,
            chunk_duration: 300.0,
            cancel: CancellationToken::new(),
        };
        assert_eq!(request.filename(), "chunk-0012.wav");
    }
}
