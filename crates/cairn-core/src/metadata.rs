//! # Run Metadata
//!
//! Counts and timestamps of the latest promotion and reasoning passes,
//! persisted as `run_meta.json`.
//!
//! Informational only. Nothing reads it back to make a decision, so a
//! missing file is simply empty metadata. Timestamps are supplied by the
//! caller; this module never reads the clock.

use crate::promotion::PromotionReport;
use crate::reasoning::ReasoningReport;
use crate::storage::StoreSummary;
use crate::CairnError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The latest promotion pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub report: PromotionReport,
    /// Knowledge Units in the log after the pass.
    pub knowledge_total: usize,
}

/// The latest reasoning pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub topic: String,
    pub top_k_per_unit: usize,
    pub report: ReasoningReport,
    pub appended: usize,
    pub already_present: usize,
    /// Reasoning Units in the log after the pass.
    pub reasoning_total: usize,
}

impl ReasoningRun {
    /// Fold a store summary into the run.
    pub fn with_summary(mut self, summary: StoreSummary) -> Self {
        self.appended = summary.appended;
        self.already_present = summary.already_present;
        self
    }
}

/// Contents of `run_meta.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PromotionRun>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningRun>,
}

impl RunMetadata {
    /// Read metadata; a missing file is empty metadata.
    pub fn load(path: &Path) -> Result<Self, CairnError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)
            .map_err(|e| CairnError::IoError(format!("{}: {}", path.display(), e)))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            CairnError::SerializationError(format!("{}: {}", path.display(), e))
        })
    }

    /// Write metadata through a temporary file and rename.
    pub fn save(&self, path: &Path) -> Result<(), CairnError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| CairnError::SerializationError(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| CairnError::IoError(format!("{}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| CairnError::IoError(format!("{}: {}", path.display(), e)))
    }

    /// Replace the promotion entry on disk, keeping the reasoning entry.
    pub fn record_promotion(path: &Path, run: PromotionRun) -> Result<Self, CairnError> {
        let mut meta = Self::load(path)?;
        meta.promotion = Some(run);
        meta.save(path)?;
        Ok(meta)
    }

    /// Replace the reasoning entry on disk, keeping the promotion entry.
    pub fn record_reasoning(path: &Path, run: ReasoningRun) -> Result<Self, CairnError> {
        let mut meta = Self::load(path)?;
        meta.reasoning = Some(run);
        meta.save(path)?;
        Ok(meta)
    }
}
