//! # Knowledge Unit Store
//!
//! Typed store over a [`RecordLog`] of Knowledge Units.
//!
//! Every append is validated first:
//! - the claim is non-empty
//! - at least one source identifies its document
//! - the id is the content address of claim + sources (computed when unset)

use super::{AppendOutcome, JsonlLog, KnowledgeLookup, MemoryLog, RecordLog};
use crate::address::ContentAddresser;
use crate::{CairnError, KnowledgeId, KnowledgeUnit};
use std::path::Path;

/// Append-only store of Knowledge Units.
#[derive(Debug)]
pub struct KnowledgeUnitStore<L = JsonlLog<KnowledgeUnit>> {
    log: L,
}

impl KnowledgeUnitStore<JsonlLog<KnowledgeUnit>> {
    /// Open the store at `log_path`, with its offset index at `index_path`.
    pub fn open(log_path: impl AsRef<Path>, index_path: impl AsRef<Path>) -> Result<Self, CairnError> {
        Ok(Self {
            log: JsonlLog::open_indexed(log_path, index_path)?,
        })
    }

    /// Rebuild the offset index from the log.
    pub fn rebuild_index(&mut self) -> Result<usize, CairnError> {
        self.log.rebuild_index()
    }
}

impl KnowledgeUnitStore<MemoryLog<KnowledgeUnit>> {
    /// An empty store that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            log: MemoryLog::new(),
        }
    }
}

impl<L: RecordLog<KnowledgeUnit>> KnowledgeUnitStore<L> {
    /// Wrap an existing backend.
    pub fn with_log(log: L) -> Self {
        Self { log }
    }

    /// Validate and append a Knowledge Unit.
    ///
    /// Idempotent: appending the same claim with the same sources again
    /// returns `AlreadyExists` and writes nothing.
    pub fn append(&mut self, ku: &KnowledgeUnit) -> Result<AppendOutcome, CairnError> {
        let ku = Self::addressed(ku)?;
        let outcome = self.log.append(&ku)?;
        tracing::debug!(
            id = %ku.id,
            appended = outcome.is_appended(),
            "knowledge unit append"
        );
        Ok(outcome)
    }

    fn addressed(ku: &KnowledgeUnit) -> Result<KnowledgeUnit, CairnError> {
        if ku.claim.trim().is_empty() {
            return Err(CairnError::InvalidKnowledgeUnit {
                id: ku.id.to_string(),
                reason: "claim is empty".to_string(),
            });
        }
        if !ku.sources.iter().any(|s| s.is_identifiable()) {
            return Err(CairnError::InvalidKnowledgeUnit {
                id: ku.id.to_string(),
                reason: "no source identifies a document".to_string(),
            });
        }

        let computed = ContentAddresser::knowledge_id(&ku.claim, &ku.sources);
        if ku.id.is_unset() {
            let mut ku = ku.clone();
            ku.id = computed;
            return Ok(ku);
        }
        if ku.id != computed {
            return Err(CairnError::AddressMismatch {
                recorded: ku.id.to_string(),
                computed: computed.to_string(),
            });
        }
        Ok(ku.clone())
    }

    pub fn contains(&self, id: &KnowledgeId) -> bool {
        self.log.contains(id.as_str())
    }

    pub fn get(&self, id: &KnowledgeId) -> Result<Option<KnowledgeUnit>, CairnError> {
        self.log.get(id.as_str())
    }

    /// Every Knowledge Unit, in insertion order.
    pub fn load_all(&self) -> Result<Vec<KnowledgeUnit>, CairnError> {
        self.log.load_all()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> Vec<KnowledgeId> {
        self.log.ids().into_iter().map(KnowledgeId).collect()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// The underlying backend.
    pub fn log(&self) -> &L {
        &self.log
    }
}

impl<L: RecordLog<KnowledgeUnit>> KnowledgeLookup for KnowledgeUnitStore<L> {
    fn knowledge(&self, id: &KnowledgeId) -> Result<Option<KnowledgeUnit>, CairnError> {
        self.get(id)
    }
}

// =============================================================================
// TESTS
// =============================================================================
