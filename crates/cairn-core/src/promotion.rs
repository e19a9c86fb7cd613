//! # Promotion
//!
//! Turns a batch of retrieval hits into Knowledge Units.
//!
//! ## Pipeline
//!
//! ```text
//! hits -> ClaimExtractor -> group by claim -> ContentAddresser -> KnowledgeUnitStore
//! ```
//!
//! Hits whose extracted claims are byte-identical within one call become one
//! unit: its sources are the distinct sources in hit order and its confidence
//! is the highest tier among them. Across calls units are immutable, so the
//! same claim with a different source set is a different unit.
//!
//! Input problems (no sentence, oversized chunk, anonymous source) skip the
//! hit and are counted. Integrity problems abort the batch.

use crate::confidence::ConfidencePolicy;
use crate::extractor::{ClaimExtractor, ExtractionConfig};
use crate::primitives::{MAX_CHUNK_LENGTH, MAX_HITS_PER_BATCH};
use crate::storage::{KnowledgeUnitStore, RecordLog};
use crate::{CairnError, Confidence, KnowledgeId, KnowledgeUnit, RetrievalHit, Source};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters for one promotion call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionReport {
    pub query: String,
    pub hits_seen: usize,
    /// Units newly written.
    pub promoted: usize,
    /// Units whose id was already in the store.
    pub already_present: usize,
    pub skipped_no_sentence: usize,
    pub skipped_oversized: usize,
    pub skipped_unsourced: usize,
    /// Hits folded into another hit's unit because their claims matched.
    pub merged_sources: usize,
    /// Ids of every unit this call produced, new or existing, in hit order.
    #[serde(skip)]
    pub knowledge_ids: Vec<KnowledgeId>,
}

impl PromotionReport {
    pub fn skipped(&self) -> usize {
        self.skipped_no_sentence + self.skipped_oversized + self.skipped_unsourced
    }
}

struct Group {
    claim: String,
    sources: Vec<Source>,
    confidence: Confidence,
}

/// Extraction plus confidence tiering.
#[derive(Debug, Clone, Default)]
pub struct Promoter {
    extractor: ClaimExtractor,
    policy: ConfidencePolicy,
}

impl Promoter {
    #[must_use]
    pub fn new(extraction: &ExtractionConfig, policy: ConfidencePolicy) -> Self {
        Self {
            extractor: ClaimExtractor::new(extraction),
            policy,
        }
    }

    /// Build the units a batch would produce, without touching a store.
    ///
    /// Hits without an explicit rank are ranked by their batch position
    /// (1-based).
    pub fn prepare(
        &self,
        hits: &[RetrievalHit],
        query: &str,
    ) -> Result<(Vec<KnowledgeUnit>, PromotionReport), CairnError> {
        if hits.len() > MAX_HITS_PER_BATCH {
            return Err(CairnError::InvalidHit(format!(
                "batch of {} hits exceeds the limit of {}",
                hits.len(),
                MAX_HITS_PER_BATCH
            )));
        }

        let mut report = PromotionReport {
            query: query.to_string(),
            hits_seen: hits.len(),
            ..PromotionReport::default()
        };
        let mut groups: Vec<Group> = Vec::new();
        let mut by_claim: BTreeMap<String, usize> = BTreeMap::new();

        for (position, hit) in hits.iter().enumerate() {
            if hit.chunk_text.len() > MAX_CHUNK_LENGTH {
                report.skipped_oversized += 1;
                continue;
            }
            if !hit.source_metadata.is_identifiable() {
                report.skipped_unsourced += 1;
                continue;
            }
            let Some(claim) = self.extractor.extract(hit, query) else {
                tracing::debug!(hit = position + 1, "no extractable sentence");
                report.skipped_no_sentence += 1;
                continue;
            };

            let confidence = self.policy.tier_for_hit(hit, position + 1);
            match by_claim.get(claim.text) {
                Some(&g) => {
                    let group = &mut groups[g];
                    if !group.sources.contains(&hit.source_metadata) {
                        group.sources.push(hit.source_metadata.clone());
                    }
                    group.confidence = group.confidence.max(confidence);
                    report.merged_sources += 1;
                }
                None => {
                    by_claim.insert(claim.text.to_string(), groups.len());
                    groups.push(Group {
                        claim: claim.text.to_string(),
                        sources: vec![hit.source_metadata.clone()],
                        confidence,
                    });
                }
            }
        }

        let units = groups
            .into_iter()
            .map(|g| KnowledgeUnit::new(g.claim, g.sources, g.confidence, query))
            .collect();
        Ok((units, report))
    }

    /// Promote a batch into a store.
    ///
    /// Each append is independently idempotent, so an interrupted batch is
    /// resumed by running it again.
    pub fn promote<L: RecordLog<KnowledgeUnit>>(
        &self,
        store: &mut KnowledgeUnitStore<L>,
        hits: &[RetrievalHit],
        query: &str,
    ) -> Result<PromotionReport, CairnError> {
        let (units, mut report) = self.prepare(hits, query)?;
        for ku in &units {
            let outcome = store.append(ku)?;
            if outcome.is_appended() {
                report.promoted += 1;
            } else {
                report.already_present += 1;
            }
            report.knowledge_ids.push(KnowledgeId::new(outcome.id()));
        }
        Ok(report)
    }
}

// =============================================================================
// TESTS
// =============================================================================
