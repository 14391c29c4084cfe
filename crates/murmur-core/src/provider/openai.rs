//! OpenAI Whisper transcription provider

use async_trait::async_trait;

use super::{
    ChunkTranscription, ProviderError, TranscriptionBackend, TranscriptionRequest,
    openai_compatible_transcribe,
};

const API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const MODEL: &str = "whisper-1";

/// OpenAI Whisper transcription provider
#[derive(Debug, Default, Clone)]
pub struct OpenAIProvider;

#[async_trait]
impl TranscriptionBackend for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn display_name(&self) -> &'static str {
        "OpenAI Whisper"
    }

    fn api_key_env(&self) -> &'static str {
        "OPENAI_API_KEY"
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
