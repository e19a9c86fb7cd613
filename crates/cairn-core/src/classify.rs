//! # Relation Classification
//!
//! Pure, stateless mapping from a candidate pair of Knowledge Units to a
//! [`Relation`].
//!
//! Inputs are only the two claim strings, whether the units cite a common
//! source document, and their [`OverlapStats`]. No external knowledge and no
//! randomness: the same pair always gets the same relation.
//!
//! ## Default rules ([`CueClassifier`])
//!
//! | same document | polarity | score | relation |
//! |---|---|---|---|
//! | yes | any | ≥ `inheritance_min_score` | `inheritance` |
//! | yes | any | below | `elaboration` |
//! | no | opposed | ≥ `conflict_min_score`, neither hedged | `conflict` |
//! | no | opposed | otherwise | `contrast` |
//! | no | compatible | contrast marker in either claim | `contrast` |
//! | no | compatible | no marker | `support` |
//!
//! Polarity is the parity of negation cues in a claim. A pair is only
//! classified once it passes [`RelationThresholds::admits`].

use crate::ngram::{OverlapStats, normalize};
use crate::{CairnError, Relation};
use serde::{Deserialize, Serialize};

// =============================================================================
// THRESHOLDS
// =============================================================================

/// Default minimum shared 4-grams for a pair to be related at all.
pub const DEFAULT_MIN_SHARED_NGRAMS: u64 = 3;

/// Default minimum overlap score for a pair to be related at all.
pub const DEFAULT_MIN_SCORE: f64 = 0.20;

/// Default overlap at which a same-document pair is `inheritance`.
pub const DEFAULT_INHERITANCE_MIN_SCORE: f64 = 0.80;

/// Default overlap at which an opposed cross-document pair is `conflict`.
pub const DEFAULT_CONFLICT_MIN_SCORE: f64 = 0.50;

/// Named, tunable relation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationThresholds {
    pub min_shared_ngrams: u64,
    pub min_score: f64,
    pub inheritance_min_score: f64,
    pub conflict_min_score: f64,
}

impl Default for RelationThresholds {
    fn default() -> Self {
        Self {
            min_shared_ngrams: DEFAULT_MIN_SHARED_NGRAMS,
            min_score: DEFAULT_MIN_SCORE,
            inheritance_min_score: DEFAULT_INHERITANCE_MIN_SCORE,
            conflict_min_score: DEFAULT_CONFLICT_MIN_SCORE,
        }
    }
}

impl RelationThresholds {
    /// All scores must lie in `[0, 1]`.
    pub fn validate(&self) -> Result<(), CairnError> {
        let named = [
            ("min_score", self.min_score),
            ("inheritance_min_score", self.inheritance_min_score),
            ("conflict_min_score", self.conflict_min_score),
        ];
        for (name, value) in named {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(CairnError::ConfigError(format!(
                    "reasoning.thresholds.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// True when a pair overlaps enough to be related.
    #[must_use]
    pub fn admits(&self, overlap: &OverlapStats) -> bool {
        overlap.shared >= self.min_shared_ngrams && overlap.score() >= self.min_score
    }
}

// =============================================================================
// CUES
// =============================================================================

/// Tokens that flip a claim's polarity.
const NEGATION_CUES: &[&str] = &[
    "not", "no", "never", "none", "nothing", "nobody", "neither", "nor", "cannot", "without",
    "lacks", "lack", "fails", "fail", "absent", "isnt", "arent", "wasnt", "werent", "dont",
    "doesnt", "didnt", "cant", "couldnt", "wont", "wouldnt", "shouldnt", "hasnt", "havent",
    "hadnt",
];

/// Tokens that weaken a claim.
const HEDGE_CUES: &[&str] = &[
    "may", "might", "could", "perhaps", "possibly", "probably", "likely", "unlikely", "seems",
    "seem", "appears", "appear", "suggests", "suggest", "arguably", "presumably", "sometimes",
];

/// Tokens that mark a contrast without negating.
const CONTRAST_CUES: &[&str] = &[
    "however", "but", "although", "though", "whereas", "yet", "nevertheless", "nonetheless",
    "conversely", "instead", "unlike", "contrary", "despite", "rather", "otherwise",
];

/// Cue counts for one claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimCues {
    pub negations: usize,
    pub hedged: bool,
    pub contrast: bool,
}

impl ClaimCues {
    /// Scan a claim's normalized tokens.
    #[must_use]
    pub fn of(claim: &str) -> Self {
        let normalized = normalize(claim);
        let mut cues = Self::default();
        for token in normalized.split_whitespace() {
            if NEGATION_CUES.contains(&token) {
                cues.negations += 1;
            }
            cues.hedged |= HEDGE_CUES.contains(&token);
            cues.contrast |= CONTRAST_CUES.contains(&token);
        }
        cues
    }

    /// Odd number of negations.
    #[must_use]
    pub fn is_negated(&self) -> bool {
        self.negations % 2 == 1
    }
}

// =============================================================================
// CLASSIFIER
// =============================================================================

/// Assigns a relation to an admitted pair.
///
/// Implementations must be pure and symmetric: swapping `left` and `right`
/// (and their sides of `overlap`) must not change the result, because an
/// edge can be reached from either endpoint and its id depends on the
/// relation.
pub trait RelationClassifier {
    fn classify(
        &self,
        left: &str,
        right: &str,
        same_document: bool,
        overlap: &OverlapStats,
    ) -> Relation;
}

/// Default lexical cue classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CueClassifier {
    thresholds: RelationThresholds,
}

impl CueClassifier {
    #[must_use]
    pub fn new(thresholds: RelationThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn thresholds(&self) -> &RelationThresholds {
        &self.thresholds
    }
}

impl RelationClassifier for CueClassifier {
    fn classify(
        &self,
        left: &str,
        right: &str,
        same_document: bool,
        overlap: &OverlapStats,
    ) -> Relation {
        let score = overlap.score();
        if same_document {
            return if score >= self.thresholds.inheritance_min_score {
                Relation::Inheritance
            } else {
                Relation::Elaboration
            };
        }

        let a = ClaimCues::of(left);
        let b = ClaimCues::of(right);
        if a.is_negated() != b.is_negated() {
            if score >= self.thresholds.conflict_min_score && !a.hedged && !b.hedged {
                Relation::Conflict
            } else {
                Relation::Contrast
            }
        } else if a.contrast || b.contrast {
            Relation::Contrast
        } else {
            Relation::Support
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ngram::shingles;

    fn stats(a: &str, b: &str) -> OverlapStats {
        OverlapStats::between(&shingles(a), &shingles(b))
    }

    fn classify(a: &str, b: &str, same_document: bool) -> Relation {
        CueClassifier::default().classify(a, b, same_document, &stats(a, b))
    }

    #[test]
    fn negation_parity() {
        assert!(ClaimCues::of("Memory is not permanent.").is_negated());
        assert!(!ClaimCues::of("It is not true that memory is never lost.").is_negated());
        assert!(ClaimCues::of("Habits don't change.").is_negated());
    }

    #[test]
    fn opposed_cross_document_pair_conflicts() {
        let a = "Memory is the retention of past impressions.";
        let b = "Memory is not the retention of past impressions.";
        assert_eq!(classify(a, b, false), Relation::Conflict);
    }

    #[test]
    fn hedged_opposition_is_contrast() {
        let a = "Memory is the retention of past impressions.";
        let b = "Memory may not be the retention of past impressions.";
        assert_eq!(classify(a, b, false), Relation::Contrast);
    }

    #[test]
    fn compatible_cross_document_pair_supports() {
        let a = "Habit is the enormous flywheel of society.";
        let b = "Habit is the flywheel of society and its conservative agent.";
        assert_eq!(classify(a, b, false), Relation::Support);
    }

    #[test]
    fn contrast_marker_without_negation() {
        let a = "Habit is the flywheel of society.";
        let b = "However, habit is the flywheel of the individual.";
        assert_eq!(classify(a, b, false), Relation::Contrast);
    }

    #[test]
    fn same_document_near_duplicate_inherits() {
        let a = "Attention selects among objects of thought.";
        let b = "Attention selects among the objects of thought.";
        assert_eq!(classify(a, b, true), Relation::Inheritance);
    }

    #[test]
    fn same_document_partial_overlap_elaborates() {
        let a = "Attention selects among objects of thought.";
        let b = "Attention is withdrawal from some things to deal with others.";
        assert_eq!(classify(a, b, true), Relation::Elaboration);
    }

    #[test]
    fn classification_is_symmetric() {
        let pairs = [
            ("Memory fades.", "Memory does not fade.", false),
            ("Habit rules.", "However habit rules.", false),
            ("Attention selects.", "Attention selects objects.", true),
        ];
        for (a, b, same) in pairs {
            assert_eq!(classify(a, b, same), classify(b, a, same));
        }
    }

    #[test]
    fn thresholds_gate_weak_pairs() {
        let t = RelationThresholds::default();
        assert!(!t.admits(&stats("Memory fades.", "Oceans are deep and wide.")));
        assert!(t.admits(&stats("Memory fades quickly.", "Memory fades slowly.")));
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let t = RelationThresholds {
            conflict_min_score: 1.5,
            ..RelationThresholds::default()
        };
        assert!(t.validate().is_err());
        assert!(RelationThresholds::default().validate().is_ok());
    }
}
