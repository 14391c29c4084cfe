//! Language-agnostic text similarity for overlap deduplication.
//!
//! Two transcriptions of the same overlap audio rarely match byte-for-byte,
//! so boundary segments are compared by Jaccard similarity over character
//! trigrams of normalized text. Normalization: NFKC, lowercase, punctuation
//! stripped, whitespace collapsed.

use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;

/// Normalize text for comparison: NFKC fold, lowercase, drop everything that
/// is neither alphanumeric nor whitespace, collapse whitespace runs.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.nfkc().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else if c.is_alphanumeric() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}

fn trigrams(text: &str) -> HashSet<(char, char, char)> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .windows(3)
        .map(|w| (w[0], w[1], w[2]))
        .collect()
}

/// Trigram Jaccard similarity of two raw strings, in `[0, 1]`.
///
/// Strings too short to produce trigrams fall back to equality of their
/// normalized forms.
pub fn trigram_jaccard(a: &str, b: &str) -> f64 {
    let na = normalize_text(a);
    let nb = normalize_text(b);
    if na == nb {
        return 1.0;
    }
    let ta = trigrams(&na);
    let tb = trigrams(&nb);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.len() + tb.len() - intersection;
    intersection as f64 / union as f64
}
