//! Mistral Voxtral transcription provider

use async_trait::async_trait;

use super::{
    ChunkTranscription, ProviderError, TranscriptionBackend, TranscriptionRequest,
    openai_compatible_transcribe,
};

const API_URL: &str = "https://api.mistral.ai/v1/audio/transcriptions";
const MODEL: &str = "voxtral-mini-latest";

/// Mistral Voxtral transcription provider
#[derive(Debug, Default, Clone)]
pub struct MistralProvider;

#[async_trait]
impl TranscriptionBackend for MistralProvider {
    fn name(&self) -> &'static str {
        "mistral"
    }

    fn display_name(&self) -> &'static str {
        "Mistral Voxtral"
    }

    fn api_key_env(&self) -> &'static str {
        "MISTRAL_API_KEY"
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
