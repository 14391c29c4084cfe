//! WAV read/write helpers shared by the normalizer and the chunker.

use std::path::Path;

use hound::{SampleFormat, WavSpec};

use super::error::AudioError;

/// Sample rate every normalized WAV is resampled to.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Mono PCM audio loaded into memory.
#[derive(Debug, Clone)]
pub struct WavData {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl WavData {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Index of the sample at `seconds`, clamped to the buffer.
    pub fn sample_at(&self, seconds: f64) -> usize {
        ((seconds * self.sample_rate as f64).round() as usize).min(self.samples.len())
    }
}

/// Whether a WAV file is already in the normalized layout
/// (mono, 16 kHz, 16-bit integer PCM).
pub fn is_normalized_spec(spec: &WavSpec) -> bool {
    spec.channels == 1
        && spec.sample_rate == TARGET_SAMPLE_RATE
        && spec.bits_per_sample == 16
        && spec.sample_format == SampleFormat::Int
}

/// Load a mono 16-bit WAV into memory.
pub fn read_wav_mono(path: &Path) -> Result<WavData, AudioError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(AudioError::MalformedWav(format!(
            "expected mono 16-bit PCM, got {} channel(s) at {} bits",
            spec.channels, spec.bits_per_sample
        )));
    }
    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(WavData {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Duration in seconds of a WAV file, measured from its sample count.
pub fn wav_duration(path: &Path) -> Result<f64, AudioError> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Write mono 16-bit PCM samples as a WAV file.
pub fn write_wav_mono(path: &Path, samples: &[i16], sample_rate: u32) -> Result<(), AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
