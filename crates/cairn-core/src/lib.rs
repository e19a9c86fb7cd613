//! # cairn-core
//!
//! Knowledge promotion and cross-document reasoning for Cairn - THE LOGIC.
//!
//! This crate turns ranked retrieval hits into durable, citation-locked
//! Knowledge Units, then relates those units with typed Reasoning Units.
//!
//! ## Guarantees
//!
//! - **Determinism**: identifiers are content addresses; the same input always
//!   yields the same records, byte for byte
//! - **Idempotency**: every append is check-then-append; replaying a batch
//!   writes nothing new
//! - **Bounded output**: at most `top_k_per_unit` edges are emitted per anchor
//!
//! ## Architectural Constraints
//!
//! - Extraction is purely selective: claims are verbatim sentences
//! - No embeddings and no language model: similarity is 4-gram overlap
//! - Logs are append-only: no record is ever rewritten or deleted
//! - No async, no network, no clock (timestamps are supplied by the caller)

// =============================================================================
// MODULES
// =============================================================================

pub mod address;
pub mod classify;
pub mod confidence;
pub mod export;
pub mod extractor;
pub mod formats;
pub mod metadata;
pub mod metrics;
pub mod ngram;
pub mod primitives;
pub mod promotion;
pub mod reasoning;
pub mod storage;
pub mod types;
pub mod verify;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CairnError, Confidence, EvidenceItem, KnowledgeId, KnowledgeUnit, ReasonId, ReasoningUnit,
    Relation, RetrievalHit, Source,
};

// =============================================================================
// RE-EXPORTS: Pipeline
// =============================================================================

pub use address::ContentAddresser;
pub use classify::{ClaimCues, CueClassifier, RelationClassifier, RelationThresholds};
pub use confidence::ConfidencePolicy;
pub use extractor::{Claim, ClaimExtractor, ExtractionConfig, split_sentences};
pub use ngram::{NGramSimilarityIndex, OverlapStats};
pub use promotion::{PromotionReport, Promoter};
pub use reasoning::{ReasoningConfig, ReasoningGraph, ReasoningGraphBuilder, ReasoningReport};

// =============================================================================
// RE-EXPORTS: Storage & Verification
// =============================================================================

pub use export::{GraphExport, canonical_digest, hash_file};
pub use metadata::{PromotionRun, ReasoningRun, RunMetadata};
pub use metrics::CorpusMetrics;
pub use storage::{
    AppendOutcome, JsonlLog, KnowledgeLookup, KnowledgeUnitStore, MemoryLog, OffsetIndex,
    ReasoningUnitStore, RecordLog, StoreSummary,
};
pub use verify::{IntegrityReport, content_addresses, referential_integrity, strict_order};
