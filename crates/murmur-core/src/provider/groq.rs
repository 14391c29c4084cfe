//! Groq Whisper transcription provider
//!
//! Groq offers an OpenAI-compatible API running Whisper models on their
//! custom LPU hardware, significantly faster and cheaper than hosted
//! Whisper.

use async_trait::async_trait;

use super::{
    ChunkTranscription, ProviderError, TranscriptionBackend, TranscriptionRequest,
    openai_compatible_transcribe,
};

const API_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
const MODEL: &str = "whisper-large-v3-turbo";

/// Groq Whisper transcription provider
#[derive(Debug, Default, Clone)]
pub struct GroqProvider;

#[async_trait]
impl TranscriptionBackend for GroqProvider {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn display_name(&self) -> &'static str {
        "Groq Whisper"
    }

    fn api_key_env(&self) -> &'static str {
        "GROQ_API_KEY"
    }

    async fn transcribe(
        &self,
        client: &reqwest::Client,
        api_key: &str,
        request: TranscriptionRequest,
    ) -> Result<ChunkTranscription, ProviderError> {
        openai_compatible_transcribe(client, API_URL, MODEL, api_key, request).await
    }
}
