//! # Configuration
//!
//! Resolution order, lowest to highest precedence:
//!
//! 1. Built-in defaults
//! 2. `cairn.toml` (`--config`, default `<data-dir>/cairn.toml`)
//! 3. Environment (`CAIRN_DATA_DIR`, `CAIRN_TOP_K`)
//! 4. Command-line flags
//!
//! `CAIRN_LOG_FORMAT` and `RUST_LOG` are read by `main` when tracing is set up.

use cairn_core::{
    CairnError, ConfidencePolicy, ExtractionConfig, JsonlLog, KnowledgeUnit, KnowledgeUnitStore,
    ReasoningConfig, ReasoningUnit, ReasoningUnitStore,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the data directory.
pub const ENV_DATA_DIR: &str = "CAIRN_DATA_DIR";

/// Environment variable overriding `reasoning.top_k_per_unit`.
pub const ENV_TOP_K: &str = "CAIRN_TOP_K";

/// Environment variable selecting log output (`text` or `json`).
pub const ENV_LOG_FORMAT: &str = "CAIRN_LOG_FORMAT";

/// Data directory used when neither flag nor environment names one.
pub const DEFAULT_DATA_DIR: &str = ".cairn";

pub const CONFIG_FILE_NAME: &str = "cairn.toml";

/// Written by `cairn init`. Every value is the built-in default.
pub const DEFAULT_CONFIG_TOML: &str = r#"# Cairn configuration.
# Every key is optional; omitted keys take the values shown here.

[reasoning]
# Maximum edges emitted per anchor Knowledge Unit.
top_k_per_unit = 5
# Label recorded on every Reasoning Unit. "*" means all.
topic = "*"

[reasoning.thresholds]
# A pair is related only if it shares this many 4-grams...
min_shared_ngrams = 3
# ...and its overlap score (shared / smaller set) reaches this.
min_score = 0.20
# Same-document pairs at or above this are "inheritance", else "elaboration".
inheritance_min_score = 0.80
# Cross-document pairs with opposed polarity at or above this, and not hedged,
# are "conflict", else "contrast".
conflict_min_score = 0.50

[confidence]
high_min_score = 0.75
high_max_rank = 3
medium_min_score = 0.50
medium_max_rank = 10

[extraction]
# Sentences longer than this many bytes are never selected as claims.
max_claim_length = 2048
extra_stop_words = []
"#;

// =============================================================================
// CONFIG FILE
// =============================================================================

/// Contents of `cairn.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CairnConfig {
    pub reasoning: ReasoningConfig,
    pub confidence: ConfidencePolicy,
    pub extraction: ExtractionConfig,
}

impl CairnConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, CairnError> {
        let config: Self =
            toml::from_str(text).map_err(|e| CairnError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, CairnError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| CairnError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
            .map_err(|e| CairnError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), CairnError> {
        if let Some(raw) = lookup(ENV_TOP_K) {
            self.reasoning.top_k_per_unit = raw.trim().parse().map_err(|_| {
                CairnError::ConfigError(format!("{} must be a positive integer, got '{}'", ENV_TOP_K, raw))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), CairnError> {
        self.reasoning.validate()?;
        self.confidence.validate()
    }
}

/// Read a process environment variable, treating empty as unset.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// =============================================================================
// DATA DIRECTORY
// =============================================================================

/// Pick the data directory: flag, then environment, then the default.
pub fn resolve_data_dir(
    flag: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| lookup(ENV_DATA_DIR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// File layout of a data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn knowledge_log(&self) -> PathBuf {
        self.root.join("knowledge.jsonl")
    }

    pub fn knowledge_index(&self) -> PathBuf {
        self.root.join("knowledge.idx")
    }

    pub fn reasoning_log(&self) -> PathBuf {
        self.root.join("reasoning.jsonl")
    }

    pub fn reasoning_index(&self) -> PathBuf {
        self.root.join("reasoning.idx")
    }

    pub fn run_meta(&self) -> PathBuf {
        self.root.join("run_meta.json")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// True once `cairn init` has run here.
    pub fn is_initialized(&self) -> bool {
        self.knowledge_log().is_file()
    }

    /// Fail with a hint when the directory was never initialized.
    pub fn require_initialized(&self) -> Result<(), CairnError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(CairnError::NotFound(format!(
                "no Cairn data directory at {} (run `cairn init`)",
                self.root.display()
            )))
        }
    }

    /// Create the directory if needed.
    pub fn create(&self) -> Result<(), CairnError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| CairnError::IoError(format!("{}: {}", self.root.display(), e)))
    }

    pub fn open_knowledge(&self) -> Result<KnowledgeUnitStore<JsonlLog<KnowledgeUnit>>, CairnError> {
        KnowledgeUnitStore::open(self.knowledge_log(), self.knowledge_index())
    }

    pub fn open_reasoning(&self) -> Result<ReasoningUnitStore<JsonlLog<ReasoningUnit>>, CairnError> {
        ReasoningUnitStore::open(self.reasoning_log(), self.reasoning_index())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_matches_defaults() {
        let parsed = CairnConfig::from_toml_str(DEFAULT_CONFIG_TOML).expect("parse");
        assert_eq!(parsed, CairnConfig::default());
    }

    #[test]
    fn flag_beats_environment() {
        let env = |name: &str| (name == ENV_DATA_DIR).then(|| "/from/env".to_string());
        assert_eq!(
            resolve_data_dir(Some(Path::new("/from/flag")), env),
            PathBuf::from("/from/flag")
        );
        assert_eq!(resolve_data_dir(None, env), PathBuf::from("/from/env"));
        assert_eq!(resolve_data_dir(None, |_| None), PathBuf::from(DEFAULT_DATA_DIR));
    }
}
