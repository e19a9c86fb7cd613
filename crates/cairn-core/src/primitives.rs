//! # Innate Primitives
//!
//! Hardcoded runtime constants for the Cairn CORE.
//!
//! These are compiled into the binary and are immutable at runtime. Anything
//! an operator may reasonably tune (thresholds, `top_k_per_unit`, confidence
//! tiers) lives in configuration instead, see [`crate::classify`] and
//! [`crate::confidence`].

/// Length of the character shingles used for lexical similarity.
///
/// Character n-grams (not word n-grams) keep the measure independent of any
/// one domain's vocabulary and degrade gracefully on short claims.
pub const NGRAM_SIZE: usize = 4;

/// Number of hex characters kept from the BLAKE3 digest (128 bits).
pub const ID_HEX_LENGTH: usize = 32;

/// Type tag prefixed to Knowledge Unit identifiers.
pub const KNOWLEDGE_ID_PREFIX: &str = "ku_";

/// Type tag prefixed to Reasoning Unit identifiers.
pub const REASONING_ID_PREFIX: &str = "ru_";

/// Version of the canonical byte layout fed to the content hash.
///
/// Changing the canonical layout changes every identifier, so this must be
/// bumped together with any such change.
pub const CANONICAL_VERSION: u8 = 1;

/// Topic sentinel meaning "all topics".
pub const TOPIC_ALL: &str = "*";

/// Default bound on emitted relations per anchor unit.
pub const DEFAULT_TOP_K_PER_UNIT: usize = 5;

/// Fixed-point denominator for overlap scores (parts per million).
pub const SCORE_SCALE: u64 = 1_000_000;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Default maximum length (bytes) of an extracted claim.
///
/// Longer sentences are not considered as claim candidates.
pub const DEFAULT_MAX_CLAIM_LENGTH: usize = 2048;

/// Maximum length of a single chunk of retrieved text (1 MB).
pub const MAX_CHUNK_LENGTH: usize = 1024 * 1024;

/// Maximum number of retrieval hits accepted in one promotion call.
pub const MAX_HITS_PER_BATCH: usize = 10_000;

/// Maximum length of one serialized log line (8 MB).
///
/// Validated before a line is handed to the JSON parser so a corrupted log
/// cannot force an unbounded allocation.
pub const MAX_RECORD_LINE_LENGTH: usize = 8 * 1024 * 1024;

/// Minimum number of KUs a Reasoning Unit must reference.
pub const MIN_REASONING_ARITY: usize = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ngram_size_is_four() {
        assert_eq!(NGRAM_SIZE, 4);
    }

    #[test]
    fn id_prefixes_are_distinct() {
        assert_ne!(KNOWLEDGE_ID_PREFIX, REASONING_ID_PREFIX);
        assert!(ID_HEX_LENGTH <= 64, "BLAKE3 hex digest is 64 characters");
    }
}
