//! Splits normalized audio into overlapping, silence-aligned chunks.
//!
//! Split points advance along the un-overlapped grid: starting from split 0,
//! the ideal next split is `previous_split + max_chunk_duration`, nudged to
//! the nearest qualifying silence. Each emitted chunk then starts
//! `overlap_duration` before its predecessor's end, so consecutive chunks
//! share exactly that much audio for the merger to deduplicate.
//!
//! The silence search window is a fixed fraction of the chunk duration
//! (`0.3 * M` wide), never of the absolute position. An earlier revision
//! scaled the window by the target position, which produced pathologically
//! wide windows for late chunks.

use std::path::{Path, PathBuf};

use super::error::AudioError;
use super::silence::SilenceRegion;
use super::wav::{self, WavData};

/// Fraction of the max chunk duration the window reaches behind the ideal
/// split point.
pub const SEARCH_BEHIND_FRACTION: f64 = 0.2;

/// Fraction of the max chunk duration the window reaches ahead of the ideal
/// split point.
pub const SEARCH_AHEAD_FRACTION: f64 = 0.1;

/// A final remainder shorter than `overlap + MIN_TAIL_MARGIN_SECS` is folded
/// into its predecessor instead of becoming its own chunk.
pub const MIN_TAIL_MARGIN_SECS: f64 = 1.0;

/// Chunk planning knobs; see `PipelineConfig` for the runtime values.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Ideal spacing between split points in seconds.
    pub max_chunk_duration: f64,
    /// Audio shared by consecutive chunks in seconds.
    pub overlap_duration: f64,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_duration: crate::configuration::DEFAULT_MAX_CHUNK_DURATION_SECS,
            overlap_duration: crate::configuration::DEFAULT_OVERLAP_DURATION_SECS,
        }
    }
}

/// Planned chunk boundaries, absolute seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSpan {
    pub start: f64,
    pub end: f64,
}

impl ChunkSpan {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Plan chunk boundaries for audio of `duration` seconds.
///
/// Invariants on the output:
/// - the union of spans covers `[0, duration]` with no gaps
/// - consecutive spans overlap by exactly `overlap_duration` (at least that
///   much after a tail merge)
/// - spans are in ascending start order
pub fn plan_chunks(
    duration: f64,
    silence: &[SilenceRegion],
    config: &ChunkerConfig,
) -> Vec<ChunkSpan> {
    let m = config.max_chunk_duration;
    let o = config.overlap_duration;

    if duration <= m {
        return vec![ChunkSpan {
            start: 0.0,
            end: duration,
        }];
    }

    let mut spans = Vec::new();
    let mut last_split = 0.0_f64;
    loop {
        let chunk_start = if spans.is_empty() {
            0.0
        } else {
            last_split - o
        };
        let target_end = last_split + m;
        if target_end >= duration {
            spans.push(ChunkSpan {
                start: chunk_start,
                end: duration,
            });
            break;
        }

        // Window width is 0.3*M regardless of how deep into the audio we are.
        let search_start = target_end - SEARCH_BEHIND_FRACTION * m;
        let search_end = (target_end + SEARCH_AHEAD_FRACTION * m).min(duration);
        let split = pick_split(silence, search_start, search_end, target_end);

        // A tail too short to stand alone is folded into this chunk.
        if duration - split < o + MIN_TAIL_MARGIN_SECS {
            spans.push(ChunkSpan {
                start: chunk_start,
                end: duration,
            });
            break;
        }

        spans.push(ChunkSpan {
            start: chunk_start,
            end: split,
        });
        last_split = split;
    }
    spans
}

/// Choose the split inside `[search_start, search_end]`: the qualifying
/// silence midpoint nearest `target_end`, or `target_end` itself when the
/// window holds no silence.
fn pick_split(silence: &[SilenceRegion], search_start: f64, search_end: f64, target_end: f64) -> f64 {
    silence
        .iter()
        .map(SilenceRegion::midpoint)
        .filter(|&mid| mid >= search_start && mid <= search_end)
        .min_by(|a, b| {
            (a - target_end)
                .abs()
                .partial_cmp(&(b - target_end).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(target_end)
}

/// One chunk cut to its own WAV file.
#[derive(Debug, Clone)]
pub struct CutChunk {
    pub index: u32,
    pub span: ChunkSpan,
    pub path: PathBuf,
}

/// Cut every planned span out of the normalized WAV into per-chunk WAV files
/// named `chunk-{NNNN}.wav` under `out_dir`.
pub fn cut_chunks(
    audio: &WavData,
    spans: &[ChunkSpan],
    out_dir: &Path,
) -> Result<Vec<CutChunk>, AudioError> {
    let mut chunks = Vec::with_capacity(spans.len());
    for (index, span) in spans.iter().enumerate() {
        let start = audio.sample_at(span.start);
        let end = audio.sample_at(span.end);
        let path = out_dir.join(format!("chunk-{index:04}.wav"));
        wav::write_wav_mono(&path, &audio.samples[start..end], audio.sample_rate)?;
        chunks.push(CutChunk {
            index: index as u32,
            span: *span,
            path,
        });
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(m: f64, o: f64) -> ChunkerConfig {
        ChunkerConfig {
            max_chunk_duration: m,
            overlap_duration: o,
        }
    }

    fn assert_coverage(spans: &[ChunkSpan], duration: f64, o: f64) {
        assert!(!spans.is_empty());
        assert_eq!(spans[0].start, 0.0);
        assert_eq!(spans.last().unwrap().end, duration);
        for pair in spans.windows(2) {
            // Ascending, gap-free, overlapping by at least O.
            assert!(pair[1].start > pair[0].start);
            let overlap = pair[0].end - pair[1].start;
            assert!(
                overlap >= o - 1e-9,
                "overlap {overlap} below {o} at {pair:?}"
            );
        }
    }

    #[test]
    fn test_short_audio_single_chunk() {
        let spans = plan_chunks(30.0, &[], &config(300.0, 10.0));
        assert_eq!(spans, vec![ChunkSpan { start: 0.0, end: 30.0 }]);
    }

    #[test]
    fn test_exact_three_chunks_without_silence() {
        // 620s at M=300/O=10: splits at 300 and 600, final tail to 620.
        let spans = plan_chunks(620.0, &[], &config(300.0, 10.0));
        assert_eq!(
            spans,
            vec![
                ChunkSpan { start: 0.0, end: 300.0 },
                ChunkSpan { start: 290.0, end: 600.0 },
                ChunkSpan { start: 590.0, end: 620.0 },
            ]
        );
    }

    #[test]
    fn test_small_tail_merges_into_predecessor() {
        // The 5s remainder is under O+1s, so a single chunk absorbs it.
        let spans = plan_chunks(305.0, &[], &config(300.0, 10.0));
        assert_eq!(spans, vec![ChunkSpan { start: 0.0, end: 305.0 }]);
    }

    #[test]
    fn test_split_prefers_nearest_silence() {
        let silence = vec![
            SilenceRegion { start: 279.0, end: 280.0 },   // mid 279.5
            SilenceRegion { start: 306.5, end: 307.5 },   // mid 307.0, nearest
            SilenceRegion { start: 500.0, end: 501.0 },   // outside the window
        ];
        let spans = plan_chunks(620.0, &silence, &config(300.0, 10.0));
        assert_eq!(spans[0].end, 307.0);
        assert_eq!(spans[1].start, 297.0);
    }

    #[test]
    fn test_silence_outside_window_is_ignored() {
        // Window for the first split is [240, 330]; silence at 200 is out.
        let silence = vec![SilenceRegion { start: 199.5, end: 200.5 }];
        let spans = plan_chunks(620.0, &silence, &config(300.0, 10.0));
        assert_eq!(spans[0].end, 300.0);
    }

    #[test]
    fn test_window_width_is_constant_across_chunks() {
        // Plant silence just outside every window's far edge; no split may
        // snap to it, proving the window never widens with chunk index.
        let m = 100.0;
        let duration = 2000.0;
        let silence: Vec<SilenceRegion> = (1..20)
            .map(|i| {
                let far = i as f64 * m + SEARCH_AHEAD_FRACTION * m + 1.0;
                SilenceRegion { start: far - 0.2, end: far + 0.2 }
            })
            .collect();
        let spans = plan_chunks(duration, &silence, &config(m, 5.0));
        for (i, pair) in spans.windows(2).enumerate() {
            let split = pair[0].end;
            let target = (i + 1) as f64 * m;
            assert!(
                (split - target).abs() <= SEARCH_AHEAD_FRACTION * m + 1e-9,
                "split {split} strayed from target {target}"
            );
        }
    }

    #[test]
    fn test_coverage_invariants_across_durations() {
        let config = config(120.0, 8.0);
        for duration in [1.0, 119.9, 120.0, 121.0, 250.0, 333.3, 1000.0, 4321.5] {
            let spans = plan_chunks(duration, &[], &config);
            assert_coverage(&spans, duration, config.overlap_duration);
        }
    }

    #[test]
    fn test_cut_chunks_writes_expected_slices() {
        let rate = 16_000u32;
        let audio = WavData {
            samples: (0..rate as usize * 10).map(|i| (i % 321) as i16).collect(),
            sample_rate: rate,
        };
        let spans = vec![
            ChunkSpan { start: 0.0, end: 6.0 },
            ChunkSpan { start: 4.0, end: 10.0 },
        ];
        let dir = tempfile::tempdir().unwrap();
        let cut = cut_chunks(&audio, &spans, dir.path()).unwrap();

        assert_eq!(cut.len(), 2);
        assert!(cut[0].path.ends_with("chunk-0000.wav"));
        assert!(cut[1].path.ends_with("chunk-0001.wav"));
        let first = wav::read_wav_mono(&cut[0].path).unwrap();
        assert_eq!(first.samples.len(), rate as usize * 6);
        let second = wav::read_wav_mono(&cut[1].path).unwrap();
        assert_eq!(second.samples.len(), rate as usize * 6);
        assert_eq!(second.samples[0], audio.samples[rate as usize * 4]);
    }
}
