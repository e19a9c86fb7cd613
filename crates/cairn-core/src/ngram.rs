//! # N-gram Similarity Index
//!
//! Character 4-gram shingle sets per Knowledge Unit claim.
//!
//! ## Normalization
//!
//! Claims are lower-cased, stripped of punctuation and symbols, and their
//! whitespace runs are collapsed to a single space before shingling, so two
//! claims that differ only in case or punctuation have identical shingles.
//!
//! ## Score
//!
//! `score = shared / min(|A|, |B|)` is an overlap ratio, not a Jaccard index:
//! a short claim contained in a long one scores 1.0. It is computed in integer
//! parts per million, so the recorded value has exactly six decimal places
//! and is identical on every platform.

use crate::KnowledgeUnit;
use crate::primitives::{NGRAM_SIZE, SCORE_SCALE};
use std::collections::BTreeSet;

/// A set of shingles.
pub type ShingleSet = BTreeSet<String>;

/// Lower-case, drop punctuation, collapse whitespace.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
        } else if ch.is_alphanumeric() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// All contiguous `NGRAM_SIZE`-character windows of the normalized text.
///
/// A non-empty normalized text shorter than the window is its own single
/// shingle; an empty one has none.
#[must_use]
pub fn shingles(text: &str) -> ShingleSet {
    let normalized = normalize(text);
    let chars: Vec<char> = normalized.chars().collect();
    if chars.is_empty() {
        return ShingleSet::new();
    }
    if chars.len() < NGRAM_SIZE {
        return std::iter::once(normalized).collect();
    }
    chars
        .windows(NGRAM_SIZE)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

// =============================================================================
// OVERLAP
// =============================================================================

/// Overlap between two shingle sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlapStats {
    /// `|A ∩ B|`
    pub shared: u64,
    pub left_size: u64,
    pub right_size: u64,
    /// `shared * 1_000_000 / min(left_size, right_size)`, rounded down.
    pub score_ppm: u64,
}

impl OverlapStats {
    /// Compare two shingle sets.
    #[must_use]
    pub fn between(left: &ShingleSet, right: &ShingleSet) -> Self {
        let (small, large) = if left.len() <= right.len() {
            (left, right)
        } else {
            (right, left)
        };
        let shared = small.iter().filter(|s| large.contains(*s)).count() as u64;
        let smaller = small.len() as u64;
        let score_ppm = if smaller == 0 {
            0
        } else {
            shared.saturating_mul(SCORE_SCALE) / smaller
        };
        Self {
            shared,
            left_size: left.len() as u64,
            right_size: right.len() as u64,
            score_ppm,
        }
    }

    /// Score as a ratio in `[0, 1]`.
    #[must_use]
    #[allow(clippy::float_arithmetic)]
    pub fn score(&self) -> f64 {
        self.score_ppm as f64 / SCORE_SCALE as f64
    }
}

// =============================================================================
// INDEX
// =============================================================================

/// Shingle sets for a closed corpus of Knowledge Units, in load order.
#[derive(Debug, Clone, Default)]
pub struct NGramSimilarityIndex {
    sets: Vec<ShingleSet>,
}

impl NGramSimilarityIndex {
    /// Shingle every unit's claim. Position `i` in the index is `units[i]`.
    #[must_use]
    pub fn build(units: &[KnowledgeUnit]) -> Self {
        Self {
            sets: units.iter().map(|ku| shingles(&ku.claim)).collect(),
        }
    }

    /// Overlap between the units at positions `a` and `b`.
    ///
    /// Out-of-range positions behave as empty claims.
    #[must_use]
    pub fn overlap(&self, a: usize, b: usize) -> OverlapStats {
        let empty = ShingleSet::new();
        let left = self.sets.get(a).unwrap_or(&empty);
        let right = self.sets.get(b).unwrap_or(&empty);
        OverlapStats::between(left, right)
    }

    /// Shingles of the unit at position `i`.
    #[must_use]
    pub fn shingles_of(&self, i: usize) -> Option<&ShingleSet> {
        self.sets.get(i)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_case_and_punctuation() {
        assert_eq!(normalize("  Hello,   World!  "), "hello world");
        assert_eq!(normalize("Don't\tstop"), "dont stop");
        assert_eq!(normalize("...!"), "");
    }

    #[test]
    fn shingles_are_four_char_windows() {
        let set = shingles("Abcde");
        let expected: ShingleSet = ["abcd", "bcde"].iter().map(|s| s.to_string()).collect();
        assert_eq!(set, expected);
    }

    #[test]
    fn short_text_is_its_own_shingle() {
        assert_eq!(shingles("Ab!").into_iter().collect::<Vec<_>>(), vec!["ab"]);
        assert!(shingles("?!").is_empty());
    }

    #[test]
    fn shingles_span_word_boundaries() {
        assert!(shingles("ab cd").contains("b cd"));
    }

    #[test]
    fn contained_claim_scores_one() {
        let short = shingles("memory fades");
        let long = shingles("Over the years, memory fades slowly.");
        let stats = OverlapStats::between(&short, &long);
        assert_eq!(stats.shared, short.len() as u64);
        assert_eq!(stats.score_ppm, SCORE_SCALE);
        assert_eq!(stats.score().to_string(), "1");
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = shingles("the retention of past impressions");
        let b = shingles("past impressions are not retained");
        let ab = OverlapStats::between(&a, &b);
        let ba = OverlapStats::between(&b, &a);
        assert_eq!(ab.shared, ba.shared);
        assert_eq!(ab.score_ppm, ba.score_ppm);
        assert_eq!(ab.left_size, ba.right_size);
    }

    #[test]
    fn empty_set_scores_zero() {
        let stats = OverlapStats::between(&ShingleSet::new(), &shingles("anything"));
        assert_eq!(stats.score_ppm, 0);
        assert_eq!(stats.shared, 0);
    }

    #[test]
    fn score_has_six_decimals() {
        let a: ShingleSet = ["aaaa", "bbbb", "cccc"].iter().map(|s| s.to_string()).collect();
        let b: ShingleSet = ["aaaa", "zzzz", "yyyy"].iter().map(|s| s.to_string()).collect();
        let stats = OverlapStats::between(&a, &b);
        assert_eq!(stats.score_ppm, 333_333);
        assert_eq!(format!("{}", stats.score()), "0.333333");
    }
}
