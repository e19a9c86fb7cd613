//! # Reasoning Graph Builder
//!
//! Builds typed Reasoning Units over a closed set of Knowledge Units.
//!
//! ## Algorithm
//!
//! For each anchor, in load order:
//! 1. Compare against every other unit (4-gram overlap)
//! 2. Keep partners admitted by the relation thresholds
//! 3. Sort by score descending, then partner id ascending
//! 4. Keep the first `top_k_per_unit`
//! 5. Classify and emit, collapsing edges already emitted from the other end
//!
//! ## Bounds
//!
//! `top_k_per_unit` bounds the edges *emitted per anchor*, so the graph has
//! at most `n * K` edges. It does not bound work: comparisons stay O(n²).
//!
//! Every emitted unit is a pure function of its pair, so the final edge set
//! does not depend on load order. Only the order of `units` does.

use crate::address::ContentAddresser;
use crate::classify::{CueClassifier, RelationClassifier, RelationThresholds};
use crate::ngram::{NGramSimilarityIndex, OverlapStats};
use crate::primitives::{DEFAULT_TOP_K_PER_UNIT, TOPIC_ALL};
use crate::{
    CairnError, EvidenceItem, KnowledgeId, KnowledgeUnit, ReasonId, ReasoningUnit, Relation,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Parameters of a reasoning pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Maximum edges emitted per anchor.
    pub top_k_per_unit: usize,
    /// Label recorded on every emitted unit; `*` means "all".
    pub topic: String,
    pub thresholds: RelationThresholds,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            top_k_per_unit: DEFAULT_TOP_K_PER_UNIT,
            topic: TOPIC_ALL.to_string(),
            thresholds: RelationThresholds::default(),
        }
    }
}

impl ReasoningConfig {
    pub fn validate(&self) -> Result<(), CairnError> {
        if self.top_k_per_unit == 0 {
            return Err(CairnError::ConfigError(
                "reasoning.top_k_per_unit must be at least 1".to_string(),
            ));
        }
        if self.topic.trim().is_empty() {
            return Err(CairnError::ConfigError(
                "reasoning.topic must not be empty".to_string(),
            ));
        }
        self.thresholds.validate()
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Counters for one reasoning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningReport {
    pub anchors: usize,
    /// Pairwise comparisons performed (`n * (n - 1)`).
    pub comparisons: u64,
    /// Comparisons that passed the thresholds.
    pub admitted: u64,
    pub emitted: usize,
    /// Edges selected by an anchor but already emitted from the other end.
    pub duplicates_collapsed: usize,
    pub by_relation: BTreeMap<Relation, usize>,
    /// Edges emitted with each unit as anchor. Never above `top_k_per_unit`.
    #[serde(skip)]
    pub per_anchor: BTreeMap<KnowledgeId, usize>,
    pub max_anchor_degree: usize,
}

/// Result of [`ReasoningGraphBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningGraph {
    /// Emitted units, grouped by anchor in load order.
    pub units: Vec<ReasoningUnit>,
    pub report: ReasoningReport,
}

// =============================================================================
// BUILDER
// =============================================================================

/// Top-K bounded reasoning graph construction.
#[derive(Debug, Clone)]
pub struct ReasoningGraphBuilder<C = CueClassifier> {
    config: ReasoningConfig,
    classifier: C,
}

impl ReasoningGraphBuilder<CueClassifier> {
    /// Builder with the default cue classifier, using the config's thresholds.
    #[must_use]
    pub fn new(config: ReasoningConfig) -> Self {
        let classifier = CueClassifier::new(config.thresholds);
        Self { config, classifier }
    }
}

impl<C: RelationClassifier> ReasoningGraphBuilder<C> {
    pub fn with_classifier(config: ReasoningConfig, classifier: C) -> Self {
        Self { config, classifier }
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    /// Build the graph over a closed corpus.
    ///
    /// Fails if a unit has no id or if two units share one.
    pub fn build(&self, units: &[KnowledgeUnit]) -> Result<ReasoningGraph, CairnError> {
        self.config.validate()?;
        check_corpus(units)?;

        let index = NGramSimilarityIndex::build(units);
        let documents: Vec<BTreeSet<String>> = units.iter().map(KnowledgeUnit::documents).collect();

        let mut report = ReasoningReport {
            anchors: units.len(),
            ..ReasoningReport::default()
        };
        let mut emitted: BTreeSet<ReasonId> = BTreeSet::new();
        let mut out = Vec::new();

        for (i, anchor) in units.iter().enumerate() {
            let mut candidates: Vec<(usize, OverlapStats)> = Vec::new();
            for j in (0..units.len()).filter(|&j| j != i) {
                report.comparisons += 1;
                let stats = index.overlap(i, j);
                if self.config.thresholds.admits(&stats) {
                    candidates.push((j, stats));
                }
            }
            report.admitted += candidates.len() as u64;

            candidates.sort_by(|(ja, a), (jb, b)| {
                b.score_ppm
                    .cmp(&a.score_ppm)
                    .then_with(|| units[*ja].id.cmp(&units[*jb].id))
            });
            candidates.truncate(self.config.top_k_per_unit);

            let mut degree = 0usize;
            for (j, stats) in candidates {
                let partner = &units[j];
                let same_document = !documents[i].is_disjoint(&documents[j]);
                let relation =
                    self.classifier
                        .classify(&anchor.claim, &partner.claim, same_document, &stats);
                let ru = self.reasoning_unit(anchor, partner, relation, &stats);

                if emitted.insert(ru.reason_id.clone()) {
                    degree += 1;
                    *report.by_relation.entry(relation).or_insert(0) += 1;
                    out.push(ru);
                } else {
                    report.duplicates_collapsed += 1;
                }
            }

            tracing::debug!(anchor = %anchor.id, degree, "anchor processed");
            report.max_anchor_degree = report.max_anchor_degree.max(degree);
            report.per_anchor.insert(anchor.id.clone(), degree);
        }

        report.emitted = out.len();
        Ok(ReasoningGraph { units: out, report })
    }

    fn reasoning_unit(
        &self,
        a: &KnowledgeUnit,
        b: &KnowledgeUnit,
        relation: Relation,
        stats: &OverlapStats,
    ) -> ReasoningUnit {
        let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };
        let knowledge_ids = vec![first.id.clone(), second.id.clone()];
        ReasoningUnit {
            reason_id: ContentAddresser::reasoning_id(relation, &knowledge_ids),
            relation,
            topic: self.config.topic.clone(),
            knowledge_ids,
            shared_ngram_count: stats.shared,
            score: stats.score(),
            evidence: vec![EvidenceItem::from(first), EvidenceItem::from(second)],
        }
    }
}

fn check_corpus(units: &[KnowledgeUnit]) -> Result<(), CairnError> {
    let mut seen = BTreeSet::new();
    for (i, ku) in units.iter().enumerate() {
        if ku.id.is_unset() {
            return Err(CairnError::InvalidKnowledgeUnit {
                id: String::new(),
                reason: format!("unit {} has no identifier", i + 1),
            });
        }
        if !seen.insert(&ku.id) {
            return Err(CairnError::DuplicateRecord {
                kind: "knowledge",
                id: ku.id.to_string(),
                line: i + 1,
            });
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
