//! Audio normalization: any supported container in, mono 16-kHz PCM WAV out.
//!
//! Video containers have their audio track extracted. Decoding goes through
//! the `ffmpeg` binary; an input that is already a mono 16-kHz 16-bit WAV is
//! passed through untouched. The reported duration always comes from the
//! resulting WAV, never from source headers (source headers are untrusted).

use std::path::{Path, PathBuf};
use std::process::Command;

use super::error::AudioError;
use super::wav::{self, TARGET_SAMPLE_RATE};

/// Audio containers accepted as-is.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "m4a", "flac", "ogg", "opus", "webm", "aac", "wma",
];

/// Video containers whose audio track is extracted.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "mpeg", "mpg", "3gp",
];

/// Inputs shorter than this are rejected as invalid audio.
pub const MIN_DURATION_SECS: f64 = 0.1;

/// Result of normalization: the WAV to chunk and its measured duration.
#[derive(Debug, Clone)]
pub struct NormalizedAudio {
    pub path: PathBuf,
    pub duration_seconds: f64,
}

pub fn is_audio_extension(ext: &str) -> bool {
    AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

pub fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Normalize `input` (with declared `extension`) into a mono 16-kHz PCM WAV
/// inside `output_dir`.
///
/// Blocking: decodes through the `ffmpeg` binary. Call from a blocking
/// context (`tokio::task::spawn_blocking` in the orchestrator).
pub fn normalize(
    input: &Path,
    extension: &str,
    output_dir: &Path,
) -> Result<NormalizedAudio, AudioError> {
    let extension = extension.to_lowercase();
    if !is_audio_extension(&extension) && !is_video_extension(&extension) {
        return Err(AudioError::UnsupportedFormat(extension));
    }

    // Already-normalized WAVs skip the decode entirely.
    if extension == "wav"
        && let Ok(reader) = hound::WavReader::open(input)
        && wav::is_normalized_spec(&reader.spec())
    {
        let duration = reader.duration() as f64 / reader.spec().sample_rate as f64;
        return finish(input.to_path_buf(), duration);
    }

    let output = output_dir.join("normalized.wav");
    run_ffmpeg(input, &output)?;

    let duration = wav::wav_duration(&output)?;
    finish(output, duration)
}

fn finish(path: PathBuf, duration: f64) -> Result<NormalizedAudio, AudioError> {
    if duration <= MIN_DURATION_SECS {
        return Err(AudioError::TooShort(duration));
    }
    crate::verbose!(
        "normalized {} ({:.1}s of audio)",
        path.display(),
        duration
    );
    Ok(NormalizedAudio {
        path,
        duration_seconds: duration,
    })
}

/// Decode/extract/resample via ffmpeg: drop any video stream, downmix to
/// mono, resample to 16 kHz signed 16-bit PCM.
fn run_ffmpeg(input: &Path, output: &Path) -> Result<(), AudioError> {
    let result = Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            input.to_str().unwrap_or_default(),
            "-vn",
            "-ac",
            "1",
            "-ar",
            &TARGET_SAMPLE_RATE.to_string(),
            "-acodec",
            "pcm_s16le",
            "-y",
            output.to_str().unwrap_or_default(),
        ])
        .output()
        .map_err(|err| {
            AudioError::DecodeFailed(format!(
                "failed to execute ffmpeg (is it installed?): {err}"
            ))
        })?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(AudioError::DecodeFailed(stderr.trim().to_string()));
    }
    Ok(())
}
