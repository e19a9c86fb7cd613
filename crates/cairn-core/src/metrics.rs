//! # Corpus Metrics
//!
//! Informational counts over the two logs, reported by `status`.
//!
//! Metrics never gate an operation. They are recomputed from the records on
//! every call, so they cannot drift from the logs.

use crate::{Confidence, KnowledgeId, KnowledgeUnit, ReasoningUnit, Relation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Snapshot of corpus shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusMetrics {
    pub knowledge_units: usize,
    pub reasoning_units: usize,
    /// Distinct source documents cited by any Knowledge Unit.
    pub documents: usize,
    /// Knowledge Units citing more than one source.
    pub multi_source_units: usize,
    pub by_confidence: BTreeMap<Confidence, usize>,
    pub by_relation: BTreeMap<Relation, usize>,
    pub topics: BTreeSet<String>,
    /// Highest number of Reasoning Units touching one Knowledge Unit.
    pub max_degree: usize,
    /// Knowledge Units with no Reasoning Unit at all.
    pub isolated_units: usize,
}

impl CorpusMetrics {
    #[must_use]
    pub fn compute(kus: &[KnowledgeUnit], rus: &[ReasoningUnit]) -> Self {
        let mut metrics = Self {
            knowledge_units: kus.len(),
            reasoning_units: rus.len(),
            ..Self::default()
        };

        let mut documents = BTreeSet::new();
        for ku in kus {
            documents.extend(ku.documents());
            if ku.sources.len() > 1 {
                metrics.multi_source_units += 1;
            }
            *metrics.by_confidence.entry(ku.confidence).or_insert(0) += 1;
        }
        metrics.documents = documents.len();

        let mut degree: BTreeMap<&KnowledgeId, usize> = BTreeMap::new();
        for ru in rus {
            *metrics.by_relation.entry(ru.relation).or_insert(0) += 1;
            metrics.topics.insert(ru.topic.clone());
            for id in &ru.knowledge_ids {
                *degree.entry(id).or_insert(0) += 1;
            }
        }
        metrics.max_degree = degree.values().copied().max().unwrap_or(0);
        metrics.isolated_units = kus.iter().filter(|ku| !degree.contains_key(&ku.id)).count();

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ContentAddresser;
    use crate::{EvidenceItem, Source};

    fn ku(claim: &str, paths: &[&str], confidence: Confidence) -> KnowledgeUnit {
        let sources = paths
            .iter()
            .map(|p| Source {
                path_relative: (*p).to_string(),
                ..Source::default()
            })
            .collect();
        KnowledgeUnit::new(claim, sources, confidence, "q")
    }

    #[test]
    fn counts_shape() {
        let a = ku("Alpha.", &["a.pdf", "b.pdf"], Confidence::High);
        let b = ku("Beta.", &["b.pdf"], Confidence::Low);
        let c = ku("Gamma.", &["c.pdf"], Confidence::Low);
        let mut ids = vec![a.id.clone(), b.id.clone()];
        ids.sort();
        let edge = ReasoningUnit {
            reason_id: ContentAddresser::reasoning_id(Relation::Support, &ids),
            relation: Relation::Support,
            topic: "memory".to_string(),
            knowledge_ids: ids,
            shared_ngram_count: 3,
            score: 0.3,
            evidence: vec![EvidenceItem::from(&a), EvidenceItem::from(&b)],
        };

        let m = CorpusMetrics::compute(&[a, b, c], &[edge]);
        assert_eq!(m.knowledge_units, 3);
        assert_eq!(m.documents, 3);
        assert_eq!(m.multi_source_units, 1);
        assert_eq!(m.by_confidence.get(&Confidence::Low), Some(&2));
        assert_eq!(m.by_relation.get(&Relation::Support), Some(&1));
        assert_eq!(m.max_degree, 1);
        assert_eq!(m.isolated_units, 1);
        assert!(m.topics.contains("memory"));
    }

    #[test]
    fn empty_corpus() {
        assert_eq!(CorpusMetrics::compute(&[], &[]), CorpusMetrics::default());
    }
}
