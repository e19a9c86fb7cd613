//! # Confidence Module
//!
//! Confidence tiering for promoted Knowledge Units.
//!
//! - Tier derived once, at promotion time, from retrieval rank and score
//! - Never recomputed: a KU keeps its tier for life
//! - Both conditions of a tier must hold (score floor AND rank ceiling)

use crate::{CairnError, Confidence, RetrievalHit};
use serde::{Deserialize, Serialize};

/// Default minimum rank score for `high`.
pub const DEFAULT_HIGH_MIN_SCORE: f64 = 0.75;

/// Default worst rank still eligible for `high`.
pub const DEFAULT_HIGH_MAX_RANK: usize = 3;

/// Default minimum rank score for `medium`.
pub const DEFAULT_MEDIUM_MIN_SCORE: f64 = 0.50;

/// Default worst rank still eligible for `medium`.
pub const DEFAULT_MEDIUM_MAX_RANK: usize = 10;

/// Rank/score thresholds mapping a retrieval hit to a confidence tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidencePolicy {
    pub high_min_score: f64,
    pub high_max_rank: usize,
    pub medium_min_score: f64,
    pub medium_max_rank: usize,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            high_min_score: DEFAULT_HIGH_MIN_SCORE,
            high_max_rank: DEFAULT_HIGH_MAX_RANK,
            medium_min_score: DEFAULT_MEDIUM_MIN_SCORE,
            medium_max_rank: DEFAULT_MEDIUM_MAX_RANK,
        }
    }
}

impl ConfidencePolicy {
    /// Check that the tiers are ordered: `high` must be at least as strict as `medium`.
    pub fn validate(&self) -> Result<(), CairnError> {
        let finite = self.high_min_score.is_finite() && self.medium_min_score.is_finite();
        if !finite {
            return Err(CairnError::ConfigError(
                "confidence thresholds must be finite".to_string(),
            ));
        }
        if self.high_min_score < self.medium_min_score {
            return Err(CairnError::ConfigError(format!(
                "confidence.high_min_score ({}) is below confidence.medium_min_score ({})",
                self.high_min_score, self.medium_min_score
            )));
        }
        if self.high_max_rank > self.medium_max_rank {
            return Err(CairnError::ConfigError(format!(
                "confidence.high_max_rank ({}) exceeds confidence.medium_max_rank ({})",
                self.high_max_rank, self.medium_max_rank
            )));
        }
        Ok(())
    }

    /// Tier for a score at a 1-based rank.
    #[must_use]
    pub fn tier(&self, rank_score: f64, rank: usize) -> Confidence {
        if rank_score >= self.high_min_score && rank <= self.high_max_rank {
            Confidence::High
        } else if rank_score >= self.medium_min_score && rank <= self.medium_max_rank {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    /// Tier for a hit; `fallback_rank` is used when the hit carries no rank.
    #[must_use]
    pub fn tier_for_hit(&self, hit: &RetrievalHit, fallback_rank: usize) -> Confidence {
        self.tier(hit.rank_score, hit.rank.unwrap_or(fallback_rank))
    }
}

// =============================================================================
// TESTS
// =============================================================================
