//! Deepgram Nova transcription provider
//!
//! Deepgram uses a different API format than OpenAI-style providers:
//! - Raw audio bytes in request body (not multipart form)
//! - Options passed as query parameters
//! - Timestamped utterances (with optional speaker labels) in the response
//!
//! Utterance timestamps come back in seconds already, chunk-local.

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    ChunkTranscription, ProviderError, TranscriptionBackend, TranscriptionRequest, truncate_raw,
};
use crate::job::{ProviderMetadata, Segment};

const API_URL: &str = "https://api.deepgram.com/v1/listen";
const MODEL: &str = "nova-2";

#[derive(Deserialize)]
struct Response {
    results: Results,
}

#[derive(Deserialize)]
struct Results {
    #[serde(default)]
    utterances: Vec<Utterance>,
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Deserialize)]
struct Utterance {
    start: f64,
    end: f64,
    transcript: String,
    #[serde(default)]
    speaker: Option<u32>,
}

#[derive(Deserialize)]
struct Channel {
    alternatives: Vec<Alternative>,
}

#[derive(Deserialize)]
struct Alternative {
    transcript: String,
}

/// Deepgram Nova transcription provider
#[derive(Debug, Default, Clone)]
pub struct DeepgramProvider;

#[async_trait]
impl TranscriptionBackend for DeepgramProvider {
    fn name(&self) -> &'static str {
        "deepgram"
    }

    fn display_name(&self) -> &'static str {
        "Deepgram Nova"
    }

    fn api_key_env(&self) -> &'static str {
        "DEEPGRAM_API_KEY"
    }

    async fn transcribe(
        &self,
        client: &reqwest::Client,
        api_key: &str,
        request: TranscriptionRequest,
    ) -> Result<ChunkTranscription, ProviderError> {
        let mut url = reqwest::Url::parse(API_URL)
            .map_err(|e| ProviderError::Unknown(format!("bad Deepgram URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("model", MODEL)
            .append_pair("smart_format", "true")
            .append_pair("utterances", "true")
            .append_pair("language", &request.language);

        let started = Instant::now();
        let send = async {
            let response = client
                .post(url)
                .header("Authorization", format!("Token {api_key}"))
                .header("Content-Type", "audio/wav")
                .body(request.audio_data.clone())
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };
        let (status, body) = tokio::select! {
            _ = request.cancel.cancelled() => return Err(ProviderError::Cancelled),
            result = send => result?,
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            return Err(ProviderError::from_status(status, &body));
        }

        let parsed: Response = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("{e}: {}", truncate_raw(&body))))?;

        let mut segments: Vec<Segment> = parsed
            .results
            .utterances
            .iter()
            .filter(|u| !u.transcript.trim().is_empty())
            .map(|u| Segment {
                start: u.start,
                end: u.end,
                text: u.transcript.trim().to_string(),
                speaker: u.speaker.map(|s| format!("speaker_{s}")),
            })
            .collect();

        // Older responses may omit utterances; fall back to the channel
        // transcript spanning the whole chunk.
        if segments.is_empty() {
            let transcript = parsed
                .results
                .channels
                .first()
                .and_then(|c| c.alternatives.first())
                .map(|a| a.transcript.trim().to_string())
                .unwrap_or_default();
            if !transcript.is_empty() {
                segments.push(Segment::new(0.0, request.chunk_duration, transcript));
            }
        }

        Ok(ChunkTranscription {
            segments,
            metadata: ProviderMetadata {
                model: MODEL.to_string(),
                input_tokens: None,
                output_tokens: None,
                latency_ms,
                finish_reason: None,
                raw_response: truncate_raw(&body),
            },
        })
    }
}
