//! Shared implementation for OpenAI-compatible transcription APIs.
//!
//! OpenAI, Groq and Mistral accept the same request/response format:
//! - Multipart form upload with `model` and `file` fields
//! - Authorization via `Bearer` token
//! - `response_format=verbose_json` for timestamped segments
//!
//! Timestamps in verbose_json are already chunk-local seconds, which is the
//! scale the pipeline requires.

use std::time::Instant;

use serde::Deserialize;

use super::super::{
    ChunkTranscription, ProviderError, TranscriptionRequest, build_prompt, truncate_raw,
};
use crate::job::{ProviderMetadata, Segment};

/// verbose_json response shape shared by OpenAI-compatible APIs.
#[derive(Deserialize)]
struct VerboseResponse {
    text: String,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

/// Transcribe one chunk through an OpenAI-compatible endpoint.
pub(crate) async fn openai_compatible_transcribe(
    client: &reqwest::Client,
    api_url: &str,
    model: &str,
    api_key: &str,
    request: TranscriptionRequest,
) -> Result<ChunkTranscription, ProviderError> {
    let prompt = build_prompt(&request);
    let form = reqwest::multipart::Form::new()
        .text("model", model.to_string())
        .text("language", request.language.clone())
        .text("prompt", prompt)
        .text("response_format", "verbose_json".to_string())
        .text("temperature", "0".to_string())
        .part(
            "file",
            reqwest::multipart::Part::bytes(request.audio_data.clone())
                .file_name(request.filename())
                .mime_str("audio/wav")
                .map_err(|e| ProviderError::Unknown(e.to_string()))?,
        );

    let started = Instant::now();
    let send = async {
        let response = client
            .post(api_url)
            .header("Authorization", format!("Bearer {api_key}"))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok::<_, reqwest::Error>((status, body))
    };

    // The cancellation token aborts the call best-effort; the driver's store
    // probes remain authoritative.
    let (status, body) = tokio::select! {
        _ = request.cancel.cancelled() => return Err(ProviderError::Cancelled),
        result = send => result?,
    };
    let latency_ms = started.elapsed().as_millis() as u64;

    if !status.is_success() {
        return Err(ProviderError::from_status(status, &body));
    }

    let parsed: VerboseResponse = serde_json::from_str(&body)
        .map_err(|e| ProviderError::InvalidResponse(format!("{e}: {}", truncate_raw(&body))))?;

    let mut segments: Vec<Segment> = parsed
        .segments
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| Segment::new(s.start, s.end, s.text.trim()))
        .collect();

    // Some deployments return plain text with no segment list; fall back to
    // one segment spanning the chunk so downstream stages have timestamps.
    if segments.is_empty() && !parsed.text.trim().is_empty() {
        segments.push(Segment::new(
            0.0,
            request.chunk_duration,
            parsed.text.trim(),
        ));
    }

    Ok(ChunkTranscription {
        segments,
        metadata: ProviderMetadata {
            model: model.to_string(),
            input_tokens: parsed.usage.as_ref().and_then(|u| u.input_tokens),
            output_tokens: parsed.usage.as_ref().and_then(|u| u.output_tokens),
            latency_ms,
            finish_reason: None,
            raw_response: truncate_raw(&body),
        },
    })
}
