//! # Core Type Definitions
//!
//! This module contains all core record types for Cairn:
//! - Identifiers (`KnowledgeId`, `ReasonId`)
//! - Provenance (`Source`) and retrieval input (`RetrievalHit`)
//! - Knowledge Units (`KnowledgeUnit`, `Confidence`)
//! - Reasoning Units (`ReasoningUnit`, `Relation`, `EvidenceItem`)
//! - Error types (`CairnError`)
//!
//! ## Serialization
//!
//! Records are persisted as one JSON object per line with camelCase field
//! names. Field declaration order is the serialization order, so it is part of
//! the on-disk format: do not reorder fields.

use crate::address::ContentAddresser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Content-derived identifier of a Knowledge Unit (`ku_` + hex digest).
///
/// An empty identifier means "not yet addressed"; stores compute it on append.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeId(pub String);

impl KnowledgeId {
    /// Create an identifier from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no identifier has been assigned yet.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for KnowledgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content-derived identifier of a Reasoning Unit (`ru_` + hex digest).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReasonId(pub String);

impl ReasonId {
    /// Create an identifier from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no identifier has been assigned yet.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ReasonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// PROVENANCE
// =============================================================================

/// Citation metadata carried verbatim from a retrieval hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub title: String,
    /// Path of the source document relative to the library root.
    #[serde(default)]
    pub path_relative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_range: Option<String>,
    #[serde(default)]
    pub chunk_id: String,
}

impl Source {
    /// Identity of the source *document* (not the chunk).
    ///
    /// The relative path when present, otherwise author and title.
    #[must_use]
    pub fn document_key(&self) -> String {
        if self.path_relative.is_empty() {
            format!("{}\u{1f}{}", self.author, self.title)
        } else {
            self.path_relative.clone()
        }
    }

    /// A source must identify its document somehow.
    #[must_use]
    pub fn is_identifiable(&self) -> bool {
        !self.path_relative.is_empty() || !self.title.is_empty() || !self.chunk_id.is_empty()
    }
}

/// A ranked retrieval hit produced by the upstream retrieval layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalHit {
    pub chunk_text: String,
    pub source_metadata: Source,
    pub rank_score: f64,
    /// 1-based rank within its result list. Defaults to the hit's position
    /// in the promotion batch when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
}

impl RetrievalHit {
    /// Create a hit without an explicit rank.
    #[must_use]
    pub fn new(chunk_text: impl Into<String>, source: Source, rank_score: f64) -> Self {
        Self {
            chunk_text: chunk_text.into(),
            source_metadata: source,
            rank_score,
            rank: None,
        }
    }
}

// =============================================================================
// KNOWLEDGE UNIT
// =============================================================================

/// Coarse confidence tier assigned at promotion time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Lower-case name as written in the log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, citation-locked claim with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeUnit {
    #[serde(default)]
    pub id: KnowledgeId,
    pub claim: String,
    pub sources: Vec<Source>,
    pub confidence: Confidence,
    pub created_from_query: String,
}

impl KnowledgeUnit {
    /// Create a Knowledge Unit with its content-derived identifier.
    #[must_use]
    pub fn new(
        claim: impl Into<String>,
        sources: Vec<Source>,
        confidence: Confidence,
        created_from_query: impl Into<String>,
    ) -> Self {
        let claim = claim.into();
        let id = ContentAddresser::knowledge_id(&claim, &sources);
        Self {
            id,
            claim,
            sources,
            confidence,
            created_from_query: created_from_query.into(),
        }
    }

    /// Distinct source documents backing this unit.
    #[must_use]
    pub fn documents(&self) -> BTreeSet<String> {
        self.sources.iter().map(Source::document_key).collect()
    }

    /// True when both units cite at least one common document.
    #[must_use]
    pub fn shares_document_with(&self, other: &Self) -> bool {
        let mine = self.documents();
        other
            .sources
            .iter()
            .any(|s| mine.contains(&s.document_key()))
    }
}

// =============================================================================
// REASONING UNIT
// =============================================================================

/// Typed relation between Knowledge Units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Support,
    Contrast,
    Elaboration,
    Inheritance,
    Conflict,
}

impl Relation {
    /// Every relation, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Support,
        Self::Contrast,
        Self::Elaboration,
        Self::Inheritance,
        Self::Conflict,
    ];

    /// Lower-case name as written in the log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::Contrast => "contrast",
            Self::Elaboration => "elaboration",
            Self::Inheritance => "inheritance",
            Self::Conflict => "conflict",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Denormalized copy of a referenced Knowledge Unit, for display without a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceItem {
    pub knowledge_id: KnowledgeId,
    pub claim: String,
    pub sources: Vec<Source>,
}

impl From<&KnowledgeUnit> for EvidenceItem {
    fn from(ku: &KnowledgeUnit) -> Self {
        Self {
            knowledge_id: ku.id.clone(),
            claim: ku.claim.clone(),
            sources: ku.sources.clone(),
        }
    }
}

/// An immutable typed edge between two or more Knowledge Units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningUnit {
    #[serde(default)]
    pub reason_id: ReasonId,
    pub relation: Relation,
    pub topic: String,
    /// Sorted, de-duplicated.
    pub knowledge_ids: Vec<KnowledgeId>,
    pub shared_ngram_count: u64,
    pub score: f64,
    pub evidence: Vec<EvidenceItem>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in Cairn.
///
/// Integrity errors ([`CairnError::is_integrity`]) mean a log can no longer be
/// trusted and abort the run. Everything else is an input, configuration or
/// I/O problem.
#[derive(Debug, Error)]
pub enum CairnError {
    /// A retrieval hit cannot be promoted.
    #[error("Invalid retrieval hit: {0}")]
    InvalidHit(String),

    /// A Knowledge Unit violates its structural invariants.
    #[error("Invalid knowledge unit {id}: {reason}")]
    InvalidKnowledgeUnit { id: String, reason: String },

    /// A Reasoning Unit violates its structural invariants.
    #[error("Invalid reasoning unit {id}: {reason}")]
    InvalidReasoningUnit { id: String, reason: String },

    /// A log line could not be decoded.
    #[error("Malformed {kind} record at line {line} (byte offset {offset}): {reason}")]
    MalformedRecord {
        kind: &'static str,
        line: usize,
        offset: u64,
        reason: String,
    },

    /// The same identifier occurs twice in one log.
    #[error("Duplicate {kind} record {id} at line {line}")]
    DuplicateRecord {
        kind: &'static str,
        id: String,
        line: usize,
    },

    /// An identifier already in the log is attached to different content.
    #[error("Identifier collision: {id} already holds different content")]
    IdCollision { id: String },

    /// A record's identifier does not match the hash of its content.
    #[error("Content address mismatch: record {recorded} hashes to {computed}")]
    AddressMismatch { recorded: String, computed: String },

    /// A Reasoning Unit references a Knowledge Unit that does not exist.
    #[error("Reasoning unit {reason_id} references unknown knowledge unit {knowledge_id}")]
    UnknownKnowledge {
        reason_id: String,
        knowledge_id: String,
    },

    /// A Reasoning Unit's evidence differs from the Knowledge Unit it names.
    #[error("Reasoning unit {reason_id} carries evidence for {knowledge_id} that differs from the stored knowledge unit")]
    EvidenceMismatch {
        reason_id: String,
        knowledge_id: String,
    },

    /// Replaying a log did not reproduce the expected id sequence.
    #[error("Order violation at position {position}: expected {expected}, found {found}")]
    OrderViolation {
        position: usize,
        expected: String,
        found: String,
    },

    /// The persisted offset index could not be read or written.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Another writer holds the store.
    #[error("Store is locked: {0} is already open by another writer")]
    StoreLocked(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// No record with the given identifier.
    #[error("Record not found: {0}")]
    NotFound(String),
}

impl CairnError {
    /// True for errors that mean a log is untrustworthy.
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::MalformedRecord { .. }
                | Self::DuplicateRecord { .. }
                | Self::IdCollision { .. }
                | Self::AddressMismatch { .. }
                | Self::UnknownKnowledge { .. }
                | Self::EvidenceMismatch { .. }
                | Self::OrderViolation { .. }
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
