//! # Verification
//!
//! Operator checks over the two logs, as pure functions of their contents.
//!
//! - [`strict_order`]: a replayed id sequence equals an expected one
//! - [`referential_integrity`]: every Reasoning Unit resolves against the
//!   Knowledge Unit log, and its evidence repeats each referenced claim and
//!   its sources
//! - [`content_addresses`]: every stored id is the hash of its content

use crate::address::ContentAddresser;
use crate::{CairnError, EvidenceItem, KnowledgeId, KnowledgeUnit, ReasoningUnit};
use serde::Serialize;
use std::collections::BTreeMap;

const END_OF_LOG: &str = "<end of log>";

/// Check that `replayed` reproduces `expected` exactly, position by position.
pub fn strict_order<S: AsRef<str>, T: AsRef<str>>(
    replayed: &[S],
    expected: &[T],
) -> Result<(), CairnError> {
    let longest = replayed.len().max(expected.len());
    for position in 0..longest {
        let found = replayed.get(position).map(AsRef::as_ref);
        let wanted = expected.get(position).map(AsRef::as_ref);
        if found != wanted {
            return Err(CairnError::OrderViolation {
                position,
                expected: wanted.unwrap_or(END_OF_LOG).to_string(),
                found: found.unwrap_or(END_OF_LOG).to_string(),
            });
        }
    }
    Ok(())
}

/// One unresolved reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    pub reason_id: String,
    pub knowledge_id: String,
}

/// Evidence that does not repeat the Knowledge Unit it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MismatchedEvidence {
    pub reason_id: String,
    pub knowledge_id: String,
}

/// Result of [`referential_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub knowledge_units: usize,
    pub reasoning_units: usize,
    pub references_checked: usize,
    pub evidence_checked: usize,
    pub dangling: Vec<DanglingReference>,
    pub mismatched_evidence: Vec<MismatchedEvidence>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty() && self.mismatched_evidence.is_empty()
    }

    /// The first problem as an error, dangling references before evidence.
    pub fn into_result(self) -> Result<Self, CairnError> {
        if let Some(d) = self.dangling.first() {
            return Err(CairnError::UnknownKnowledge {
                reason_id: d.reason_id.clone(),
                knowledge_id: d.knowledge_id.clone(),
            });
        }
        if let Some(m) = self.mismatched_evidence.first() {
            return Err(CairnError::EvidenceMismatch {
                reason_id: m.reason_id.clone(),
                knowledge_id: m.knowledge_id.clone(),
            });
        }
        Ok(self)
    }
}

/// Resolve every `knowledgeIds` entry of every Reasoning Unit and compare
/// the matching evidence item with the unit it names.
#[must_use]
pub fn referential_integrity(kus: &[KnowledgeUnit], rus: &[ReasoningUnit]) -> IntegrityReport {
    let known: BTreeMap<&KnowledgeId, &KnowledgeUnit> = kus.iter().map(|ku| (&ku.id, ku)).collect();
    let mut report = IntegrityReport {
        knowledge_units: kus.len(),
        reasoning_units: rus.len(),
        ..IntegrityReport::default()
    };
    for ru in rus {
        for (position, id) in ru.knowledge_ids.iter().enumerate() {
            report.references_checked += 1;
            let Some(ku) = known.get(id) else {
                report.dangling.push(DanglingReference {
                    reason_id: ru.reason_id.to_string(),
                    knowledge_id: id.to_string(),
                });
                continue;
            };
            report.evidence_checked += 1;
            if ru.evidence.get(position) != Some(&EvidenceItem::from(*ku)) {
                report.mismatched_evidence.push(MismatchedEvidence {
                    reason_id: ru.reason_id.to_string(),
                    knowledge_id: id.to_string(),
                });
            }
        }
    }
    report
}

/// Recompute every id from content; fails on the first mismatch.
pub fn content_addresses(kus: &[KnowledgeUnit], rus: &[ReasoningUnit]) -> Result<usize, CairnError> {
    for ku in kus {
        let computed = ContentAddresser::knowledge_id(&ku.claim, &ku.sources);
        if computed != ku.id {
            return Err(CairnError::AddressMismatch {
                recorded: ku.id.to_string(),
                computed: computed.to_string(),
            });
        }
    }
    for ru in rus {
        let computed = ContentAddresser::reasoning_id(ru.relation, &ru.knowledge_ids);
        if computed != ru.reason_id {
            return Err(CairnError::AddressMismatch {
                recorded: ru.reason_id.to_string(),
                computed: computed.to_string(),
            });
        }
    }
    Ok(kus.len() + rus.len())
}

// =============================================================================
// TESTS
// =============================================================================
