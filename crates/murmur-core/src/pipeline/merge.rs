//! Stitches per-chunk transcriptions into a single transcript.
//!
//! Chunk-local segment timestamps are shifted to absolute time, then the
//! deliberately duplicated overlap audio between consecutive chunks is
//! deduplicated: a head segment of the later chunk that is near-identical to
//! a boundary-proximate tail segment of the earlier chunk is dropped;
//! otherwise the tail segment is truncated so segments never visually
//! overlap.

use crate::job::{ChunkRecord, Segment};

use super::similarity::trigram_jaccard;

/// Tail/head segment pairs are only compared when their start times are
/// within this many seconds of each other.
pub const BOUNDARY_PROXIMITY_SECS: f64 = 2.0;

/// A gap between consecutive segments larger than this becomes a paragraph
/// break in `full_text`.
pub const PARAGRAPH_GAP_SECS: f64 = 1.5;

/// Operator-visibility warning emitted during the post-merge validation.
///
/// These never fail the job; the coverage retry in the chunk driver already
/// had its chance to fix the gap.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeWarning {
    pub chunk_index: u32,
    pub kind: MergeWarningKind,
    pub gap_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeWarningKind {
    /// Provider skipped audio at the chunk start.
    LeadingGap,
    /// Provider stopped early before the chunk end.
    TrailingGap,
}

impl std::fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            MergeWarningKind::LeadingGap => write!(
                f,
                "chunk {}: provider skipped {:.1}s of audio at chunk start",
                self.chunk_index, self.gap_seconds
            ),
            MergeWarningKind::TrailingGap => write!(
                f,
                "chunk {}: provider stopped {:.1}s early before chunk end",
                self.chunk_index, self.gap_seconds
            ),
        }
    }
}

/// Result of merging a job's chunk transcriptions.
#[derive(Debug, Clone)]
pub struct MergeOutput {
    /// Ordered segments with absolute timestamps.
    pub segments: Vec<Segment>,
    /// Concatenated text, paragraph-broken at long pauses.
    pub full_text: String,
    pub warnings: Vec<MergeWarning>,
}

/// Merge completed chunks (ordered by index) into one transcript.
pub fn merge_chunks(
    chunks: &[ChunkRecord],
    similarity_threshold: f64,
    gap_warning_threshold: f64,
) -> MergeOutput {
    let warnings = validate_coverage(chunks, gap_warning_threshold);

    // Shift every chunk's segments to absolute time.
    let mut per_chunk: Vec<Vec<Segment>> = chunks
        .iter()
        .map(|chunk| {
            let mut segments: Vec<Segment> = chunk
                .segments
                .iter()
                .map(|s| Segment {
                    start: chunk.start_time + s.start,
                    end: chunk.start_time + s.end,
                    text: s.text.clone(),
                    speaker: s.speaker.clone(),
                })
                .collect();
            segments.sort_by(|a, b| a.start.total_cmp(&b.start));
            segments
        })
        .collect();

    for i in 1..per_chunk.len() {
        let overlap_start = chunks[i].start_time;
        let overlap_end = chunks[i - 1].end_time;
        let (left, right) = per_chunk.split_at_mut(i);
        dedupe_boundary(
            &mut left[i - 1],
            &mut right[0],
            overlap_start,
            overlap_end,
            similarity_threshold,
            chunks[i].index,
        );
    }

    let mut segments: Vec<Segment> = per_chunk.into_iter().flatten().collect();
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    let full_text = build_full_text(&segments);

    MergeOutput {
        segments,
        full_text,
        warnings,
    }
}

/// Deduplicate the overlap region `[overlap_start, overlap_end]` between the
/// previous chunk's segments (`tail`) and the current chunk's (`head`).
fn dedupe_boundary(
    tail: &mut Vec<Segment>,
    head: &mut Vec<Segment>,
    overlap_start: f64,
    overlap_end: f64,
    similarity_threshold: f64,
    chunk_index: u32,
) {
    let mut kept = Vec::with_capacity(head.len());

    'heads: for h in head.drain(..) {
        // Segments past the overlap region pass through unchanged.
        if h.start >= overlap_end {
            kept.push(h);
            continue;
        }

        for t in tail
            .iter()
            .filter(|t| t.end > overlap_start && (t.start - h.start).abs() <= BOUNDARY_PROXIMITY_SECS)
        {
            let similarity = trigram_jaccard(&t.text, &h.text);
            if similarity >= similarity_threshold {
                crate::verbose!(
                    "chunk {chunk_index}: dropped duplicate overlap segment at {:.1}s \
                     (similarity {similarity:.2}): {:?}",
                    h.start,
                    h.text
                );
                continue 'heads;
            }
        }

        // Differing text: keep the head and pull back any tail segment that
        // would visually overlap it.
        for t in tail.iter_mut() {
            if t.start < h.start && t.end > h.start {
                t.end = h.start;
            }
        }
        tail.retain(|t| t.end - t.start > 1e-9);
        kept.push(h);
    }

    *head = kept;
}

/// Post-merge validation over the raw (pre-dedup) chunk results.
fn validate_coverage(chunks: &[ChunkRecord], gap_threshold: f64) -> Vec<MergeWarning> {
    let mut warnings = Vec::new();
    for chunk in chunks {
        let duration = chunk.duration();
        let Some(first) = chunk.segments.first() else {
            warnings.push(MergeWarning {
                chunk_index: chunk.index,
                kind: MergeWarningKind::LeadingGap,
                gap_seconds: duration,
            });
            continue;
        };
        let last = chunk.segments.last().unwrap_or(first);
        if first.start > gap_threshold {
            warnings.push(MergeWarning {
                chunk_index: chunk.index,
                kind: MergeWarningKind::LeadingGap,
                gap_seconds: first.start,
            });
        }
        let trailing = duration - last.end;
        if trailing > gap_threshold {
            warnings.push(MergeWarning {
                chunk_index: chunk.index,
                kind: MergeWarningKind::TrailingGap,
                gap_seconds: trailing,
            });
        }
    }
    warnings
}

/// Join segment texts with single spaces, inserting a newline when the pause
/// to the next segment exceeds [`PARAGRAPH_GAP_SECS`].
fn build_full_text(segments: &[Segment]) -> String {
    let mut out = String::new();
    let mut prev_end: Option<f64> = None;
    for segment in segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }
        if let Some(end) = prev_end {
            if segment.start - end > PARAGRAPH_GAP_SECS {
                out.push('\n');
            } else {
                out.push(' ');
            }
        }
        out.push_str(text);
        prev_end = Some(segment.end);
    }
    out
}
