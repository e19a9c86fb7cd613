//! # Reasoning Unit Store
//!
//! Typed store over a [`RecordLog`] of Reasoning Units.
//!
//! Appends are checked against the Knowledge Unit store (or any
//! [`KnowledgeLookup`]): a Reasoning Unit may only reference Knowledge Units
//! that already exist, so the reasoning log can never dangle, and each
//! evidence item must repeat its unit's claim and sources exactly.

use super::{AppendOutcome, JsonlLog, KnowledgeLookup, MemoryLog, RecordLog};
use crate::address::ContentAddresser;
use crate::primitives::MIN_REASONING_ARITY;
use crate::{CairnError, EvidenceItem, ReasonId, ReasoningUnit};
use std::path::Path;

/// Counts from a batch append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub appended: usize,
    pub already_present: usize,
}

/// Append-only store of Reasoning Units.
#[derive(Debug)]
pub struct ReasoningUnitStore<L = JsonlLog<ReasoningUnit>> {
    log: L,
}

impl ReasoningUnitStore<JsonlLog<ReasoningUnit>> {
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

impl ReasoningUnitStore<MemoryLog<ReasoningUnit>> {
    /// An empty store that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            log: MemoryLog::new(),
        }
    }
}

impl<L: RecordLog<ReasoningUnit>> ReasoningUnitStore<L> {
    /// Wrap an existing backend.
    pub fn with_log(log: L) -> Self {
        Self { log }
    }

    /// Validate and append one Reasoning Unit.
    pub fn append(
        &mut self,
        ru: &ReasoningUnit,
        knowledge: &impl KnowledgeLookup,
    ) -> Result<AppendOutcome, CairnError> {
        let ru = Self::addressed(ru, knowledge)?;
        let outcome = self.log.append(&ru)?;
        tracing::debug!(
            id = %ru.reason_id,
            relation = %ru.relation,
            appended = outcome.is_appended(),
            "reasoning unit append"
        );
        Ok(outcome)
    }

    /// Append a batch in order, stopping at the first error.
    pub fn append_all(
        &mut self,
        units: &[ReasoningUnit],
        knowledge: &impl KnowledgeLookup,
    ) -> Result<StoreSummary, CairnError> {
        let mut summary = StoreSummary::default();
        for ru in units {
            if self.append(ru, knowledge)?.is_appended() {
                summary.appended += 1;
            } else {
                summary.already_present += 1;
            }
        }
        Ok(summary)
    }

    fn addressed(
        ru: &ReasoningUnit,
        knowledge: &impl KnowledgeLookup,
    ) -> Result<ReasoningUnit, CairnError> {
        let invalid = |reason: String| CairnError::InvalidReasoningUnit {
            id: ru.reason_id.to_string(),
            reason,
        };

        if ru.knowledge_ids.len() < MIN_REASONING_ARITY {
            return Err(invalid(format!(
                "references {} knowledge unit(s), needs at least {}",
                ru.knowledge_ids.len(),
                MIN_REASONING_ARITY
            )));
        }
        if !ru.knowledge_ids.windows(2).all(|w| w[0] < w[1]) {
            return Err(invalid(
                "knowledge ids are not sorted and unique".to_string(),
            ));
        }
        if !ru.score.is_finite() || !(0.0..=1.0).contains(&ru.score) {
            return Err(invalid(format!("score {} outside [0, 1]", ru.score)));
        }
        let evidence_ids: Vec<_> = ru.evidence.iter().map(|e| &e.knowledge_id).collect();
        if evidence_ids != ru.knowledge_ids.iter().collect::<Vec<_>>() {
            return Err(invalid(
                "evidence does not match knowledge ids".to_string(),
            ));
        }

        let computed = ContentAddresser::reasoning_id(ru.relation, &ru.knowledge_ids);
        if !ru.reason_id.is_unset() && ru.reason_id != computed {
            return Err(CairnError::AddressMismatch {
                recorded: ru.reason_id.to_string(),
                computed: computed.to_string(),
            });
        }

        for (id, item) in ru.knowledge_ids.iter().zip(&ru.evidence) {
            let Some(ku) = knowledge.knowledge(id)? else {
                return Err(CairnError::UnknownKnowledge {
                    reason_id: computed.to_string(),
                    knowledge_id: id.to_string(),
                });
            };
            if *item != EvidenceItem::from(&ku) {
                return Err(CairnError::EvidenceMismatch {
                    reason_id: computed.to_string(),
                    knowledge_id: id.to_string(),
                });
            }
        }

        let mut ru = ru.clone();
        ru.reason_id = computed;
        Ok(ru)
    }

    pub fn contains(&self, id: &ReasonId) -> bool {
        self.log.contains(id.as_str())
    }

    pub fn get(&self, id: &ReasonId) -> Result<Option<ReasoningUnit>, CairnError> {
        self.log.get(id.as_str())
    }

    /// Every Reasoning Unit, in insertion order.
    pub fn load_all(&self) -> Result<Vec<ReasoningUnit>, CairnError> {
        self.log.load_all()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> Vec<ReasonId> {
        self.log.ids().into_iter().map(ReasonId).collect()
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

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Confidence, KnowledgeId, KnowledgeUnit, Relation, Source};
    use std::collections::BTreeMap;

    fn ku(claim: &str, path: &str) -> KnowledgeUnit {
        KnowledgeUnit::new(
            claim,
            vec![Source {
                path_relative: path.to_string(),
                ..Source::default()
            }],
            Confidence::Medium,
            "q",
        )
    }

    fn edge(a: &KnowledgeUnit, b: &KnowledgeUnit, relation: Relation, topic: &str) -> ReasoningUnit {
        let mut pair = [a, b];
        pair.sort_by(|x, y| x.id.cmp(&y.id));
        ReasoningUnit {
            reason_id: ReasonId::default(),
            relation,
            topic: topic.to_string(),
            knowledge_ids: pair.iter().map(|k| k.id.clone()).collect(),
            shared_ngram_count: 4,
            score: 0.5,
            evidence: pair.iter().map(|k| EvidenceItem::from(*k)).collect(),
        }
    }

    fn known(units: &[&KnowledgeUnit]) -> BTreeMap<KnowledgeId, KnowledgeUnit> {
        units.iter().map(|k| (k.id.clone(), (*k).clone())).collect()
    }

    #[test]
    fn reason_id_ignores_topic() {
        let a = ku("Alpha.", "a.pdf");
        let b = ku("Beta.", "b.pdf");
        let lookup = known(&[&a, &b]);
        let mut store = ReasoningUnitStore::in_memory();

        let first = store
            .append(&edge(&a, &b, Relation::Support, "t1"), &lookup)
            .expect("append");
        let second = store
            .append(&edge(&a, &b, Relation::Support, "t2"), &lookup)
            .expect("append");
        assert!(first.is_appended());
        assert_eq!(second, AppendOutcome::AlreadyExists { id: first.id().to_string() });
        let stored = store
            .get(&ReasonId::new(first.id()))
            .expect("get")
            .expect("present");
        assert_eq!(stored.topic, "t1");
    }

    #[test]
    fn dangling_reference_rejected() {
        let a = ku("Alpha.", "a.pdf");
        let b = ku("Beta.", "b.pdf");
        let mut store = ReasoningUnitStore::in_memory();
        let err = store
            .append(&edge(&a, &b, Relation::Support, "t"), &known(&[&a]))
            .expect_err("must fail");
        assert!(matches!(err, CairnError::UnknownKnowledge { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn fabricated_evidence_rejected() {
        let a = ku("Alpha.", "a.pdf");
        let b = ku("Beta.", "b.pdf");
        let lookup = known(&[&a, &b]);
        let mut ru = edge(&a, &b, Relation::Support, "t");
        let target = ru.evidence[1].knowledge_id.clone();
        ru.evidence[1].claim = "Something nobody wrote.".to_string();
        ru.evidence[1].sources.clear();

        let mut store = ReasoningUnitStore::in_memory();
        let err = store.append(&ru, &lookup).expect_err("must fail");
        match &err {
            CairnError::EvidenceMismatch { knowledge_id, .. } => {
                assert_eq!(knowledge_id, target.as_str());
            }
            other => unreachable!("unexpected error: {other}"),
        }
        assert!(err.is_integrity());
        assert!(store.is_empty());
    }

    #[test]
    fn evidence_sources_must_match() {
        let a = ku("Alpha.", "a.pdf");
        let b = ku("Beta.", "b.pdf");
        let mut ru = edge(&a, &b, Relation::Contrast, "t");
        ru.evidence[0].sources[0].path_relative = "elsewhere.pdf".to_string();

        let mut store = ReasoningUnitStore::in_memory();
        assert!(matches!(
            store.append(&ru, &known(&[&a, &b])),
            Err(CairnError::EvidenceMismatch { .. })
        ));
    }

    #[test]
    fn checks_against_knowledge_store() {
        let a = ku("Alpha.", "a.pdf");
        let b = ku("Beta.", "b.pdf");
        let mut knowledge = crate::KnowledgeUnitStore::in_memory();
        knowledge.append(&a).expect("append");
        knowledge.append(&b).expect("append");

        let mut store = ReasoningUnitStore::in_memory();
        assert!(store
            .append(&edge(&a, &b, Relation::Support, "t"), &knowledge)
            .expect("append")
            .is_appended());

        let mut forged = edge(&a, &b, Relation::Conflict, "t");
        forged.evidence[0].claim = "Alpha, reworded.".to_string();
        assert!(matches!(
            store.append(&forged, &knowledge),
            Err(CairnError::EvidenceMismatch { .. })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unsorted_ids_rejected() {
        let a = ku("Alpha.", "a.pdf");
        let b = ku("Beta.", "b.pdf");
        let mut ru = edge(&a, &b, Relation::Support, "t");
        ru.knowledge_ids.reverse();
        ru.evidence.reverse();
        let mut store = ReasoningUnitStore::in_memory();
        assert!(matches!(
            store.append(&ru, &known(&[&a, &b])),
            Err(CairnError::InvalidReasoningUnit { .. })
        ));
    }

    #[test]
    fn single_member_rejected() {
        let a = ku("Alpha.", "a.pdf");
        let ru = ReasoningUnit {
            reason_id: ReasonId::default(),
            relation: Relation::Support,
            topic: "t".to_string(),
            knowledge_ids: vec![a.id.clone()],
            shared_ngram_count: 1,
            score: 1.0,
            evidence: vec![EvidenceItem::from(&a)],
        };
        let mut store = ReasoningUnitStore::in_memory();
        assert!(store.append(&ru, &known(&[&a])).is_err());
    }

    #[test]
    fn out_of_range_score_rejected() {
        let a = ku("Alpha.", "a.pdf");
        let b = ku("Beta.", "b.pdf");
        let mut ru = edge(&a, &b, Relation::Contrast, "t");
        ru.score = f64::NAN;
        let mut store = ReasoningUnitStore::in_memory();
        assert!(store.append(&ru, &known(&[&a, &b])).is_err());
    }

    #[test]
    fn batch_counts_duplicates() {
        let a = ku("Alpha.", "a.pdf");
        let b = ku("Beta.", "b.pdf");
        let c = ku("Gamma.", "c.pdf");
        let lookup = known(&[&a, &b, &c]);
        let units = vec![
            edge(&a, &b, Relation::Support, "t"),
            edge(&b, &c, Relation::Conflict, "t"),
            edge(&a, &b, Relation::Support, "t"),
        ];
        let mut store = ReasoningUnitStore::in_memory();
        let summary = store.append_all(&units, &lookup).expect("append");
        assert_eq!(
            summary,
            StoreSummary {
                appended: 2,
                already_present: 1
            }
        );
    }
}
