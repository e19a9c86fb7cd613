//! # Storage Module
//!
//! Append-only, idempotent record stores.
//!
//! ## Layers
//!
//! - [`RecordLog`]: the backend trait. `append` is check-then-append and is
//!   the only write path; no backend exposes a file handle.
//!   - [`MemoryLog`]: in-memory backend for tests and dry runs
//!   - [`JsonlLog`]: line-delimited JSON file with an id → byte-offset index,
//!     optionally persisted in a redb [`OffsetIndex`]
//! - [`KnowledgeUnitStore`] / [`ReasoningUnitStore`]: typed stores that
//!   enforce record invariants before anything reaches the backend.
//!
//! ## Concurrency
//!
//! `append` takes `&mut self`, so one store value can never race with itself
//! on check-then-write. Stores are single-writer by construction.

mod index;
mod jsonl;
mod knowledge;
mod memory;
mod reasoning;

pub use index::{IndexSnapshot, OffsetIndex};
pub use jsonl::JsonlLog;
pub use knowledge::KnowledgeUnitStore;
pub use memory::MemoryLog;
pub use reasoning::{ReasoningUnitStore, StoreSummary};

use crate::formats::LogRecord;
use crate::{CairnError, KnowledgeId, KnowledgeUnit};
use std::collections::BTreeMap;

// =============================================================================
// APPEND OUTCOME
// =============================================================================

/// Result of an idempotent append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was new and is now durable at `position`
    /// (byte offset for file logs, record index for memory logs).
    Appended { id: String, position: u64 },
    /// A record with identical content was already present. Not an error.
    AlreadyExists { id: String },
}

impl AppendOutcome {
    /// Identifier of the record concerned.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Appended { id, .. } | Self::AlreadyExists { id } => id,
        }
    }

    /// True when this call wrote a new record.
    #[must_use]
    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Appended { .. })
    }
}

// =============================================================================
// RECORDLOG TRAIT
// =============================================================================

/// Backend for an append-only record log.
///
/// All implementations must preserve insertion order across `load_all` and
/// `ids`, and must treat re-appending a known id with the same content as a
/// no-op.
pub trait RecordLog<R: LogRecord> {
    /// Append a record unless its id is already present.
    ///
    /// A known id with identical content returns `AlreadyExists`; a known id
    /// with different content is an `IdCollision`.
    fn append(&mut self, record: &R) -> Result<AppendOutcome, CairnError>;

    /// Index lookup; never touches the log body.
    fn contains(&self, id: &str) -> bool;

    /// Fetch one record by id.
    fn get(&self, id: &str) -> Result<Option<R>, CairnError>;

    /// Replay every record in insertion order.
    fn load_all(&self) -> Result<Vec<R>, CairnError>;

    /// Record ids in insertion order, as recorded by the index.
    fn ids(&self) -> Vec<String>;

    /// Number of records.
    fn len(&self) -> usize;

    /// True when the log holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve an append against an id that is already indexed.
pub(crate) fn resolve_existing<R: LogRecord>(
    stored: Option<R>,
    record: &R,
) -> Result<AppendOutcome, CairnError> {
    let id = record.record_id().to_string();
    match stored {
        Some(existing) if existing.same_content(record) => Ok(AppendOutcome::AlreadyExists { id }),
        Some(_) => Err(CairnError::IdCollision { id }),
        None => Err(CairnError::IndexError(format!(
            "{} {} is indexed but cannot be read back",
            R::KIND,
            id
        ))),
    }
}

/// Reject records that reach a backend without an identifier.
pub(crate) fn require_id<R: LogRecord>(record: &R) -> Result<(), CairnError> {
    if record.record_id().is_empty() {
        return Err(CairnError::SerializationError(format!(
            "{} record has no identifier",
            R::KIND
        )));
    }
    Ok(())
}

// =============================================================================
// KNOWLEDGE LOOKUP
// =============================================================================

/// Read access to the Knowledge Units a Reasoning Unit may reference.
///
/// Used by [`ReasoningUnitStore`] to enforce referential integrity and to
/// check that evidence repeats the referenced claim and sources.
pub trait KnowledgeLookup {
    /// The stored unit with this id, if any.
    fn knowledge(&self, id: &KnowledgeId) -> Result<Option<KnowledgeUnit>, CairnError>;
}

impl KnowledgeLookup for BTreeMap<KnowledgeId, KnowledgeUnit> {
    fn knowledge(&self, id: &KnowledgeId) -> Result<Option<KnowledgeUnit>, CairnError> {
        Ok(self.get(id).cloned())
    }
}
