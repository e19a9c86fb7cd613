//! # Graph Export Module
//!
//! Renders the two logs as one graph, for inspection and for re-run checks.
//!
//! - JSON: header + nodes (Knowledge Units) + edges (Reasoning Units)
//! - DOT: undirected Graphviz graph, one edge per pairwise Reasoning Unit
//!
//! The header carries a BLAKE3 digest of a sorted, bit-exact `postcard`
//! encoding of the graph. Two runs that produced the same records produce the
//! same digest, whatever the order the records were appended in.

use crate::{CairnError, KnowledgeUnit, ReasoningUnit};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::Read;
use std::path::Path;

/// Magic bytes for the canonical digest input.
pub const EXPORT_MAGIC: [u8; 4] = *b"CRNX";

/// Current export format version.
pub const EXPORT_VERSION: u8 = 1;

/// Longest claim prefix used as a DOT label.
const DOT_LABEL_CHARS: usize = 60;

// =============================================================================
// EXPORT MODEL
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportHeader {
    pub version: u8,
    pub node_count: u64,
    pub edge_count: u64,
    /// BLAKE3 hex digest of the canonical encoding.
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportNode {
    pub id: String,
    pub claim: String,
    pub confidence: String,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEdge {
    pub id: String,
    pub relation: String,
    pub topic: String,
    pub knowledge_ids: Vec<String>,
    pub shared_ngram_count: u64,
    pub score: f64,
}

/// Graph view of the logs, in log order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub header: ExportHeader,
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
}

/// Sorted, float-free digest input.
#[derive(Serialize)]
struct CanonicalGraph<'a> {
    magic: [u8; 4],
    version: u8,
    /// `(id, claim)` sorted by id.
    nodes: Vec<(&'a str, &'a str)>,
    /// `(id, relation, knowledge ids, shared, score bits)` sorted by id.
    edges: Vec<(&'a str, &'a str, Vec<&'a str>, u64, u64)>,
}

impl GraphExport {
    /// Build the export and its digest.
    pub fn from_logs(kus: &[KnowledgeUnit], rus: &[ReasoningUnit]) -> Result<Self, CairnError> {
        let digest = canonical_digest(kus, rus)?;
        let nodes = kus
            .iter()
            .map(|ku| ExportNode {
                id: ku.id.to_string(),
                claim: ku.claim.clone(),
                confidence: ku.confidence.to_string(),
                documents: ku.documents().into_iter().collect(),
            })
            .collect();
        let edges = rus
            .iter()
            .map(|ru| ExportEdge {
                id: ru.reason_id.to_string(),
                relation: ru.relation.to_string(),
                topic: ru.topic.clone(),
                knowledge_ids: ru.knowledge_ids.iter().map(ToString::to_string).collect(),
                shared_ngram_count: ru.shared_ngram_count,
                score: ru.score,
            })
            .collect();

        Ok(Self {
            header: ExportHeader {
                version: EXPORT_VERSION,
                node_count: kus.len() as u64,
                edge_count: rus.len() as u64,
                digest,
            },
            nodes,
            edges,
        })
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, CairnError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CairnError::SerializationError(format!("export: {}", e)))
    }

    /// Graphviz DOT.
    ///
    /// Pairwise edges are drawn directly. An edge over more than two units
    /// is drawn as a point node joined to each member.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "graph cairn {{");
        let _ = writeln!(out, "  // digest {}", self.header.digest);
        let _ = writeln!(out, "  node [shape=box];");
        for node in &self.nodes {
            let _ = writeln!(
                out,
                "  \"{}\" [label=\"{}\"];",
                node.id,
                dot_escape(&truncate_chars(&node.claim, DOT_LABEL_CHARS))
            );
        }
        for edge in &self.edges {
            let label = format!("{} {}", edge.relation, edge.score);
            match edge.knowledge_ids.as_slice() {
                [a, b] => {
                    let _ = writeln!(out, "  \"{}\" -- \"{}\" [label=\"{}\"];", a, b, label);
                }
                members => {
                    let _ = writeln!(
                        out,
                        "  \"{}\" [shape=point, xlabel=\"{}\"];",
                        edge.id, label
                    );
                    for member in members {
                        let _ = writeln!(out, "  \"{}\" -- \"{}\";", edge.id, member);
                    }
                }
            }
        }
        out.push_str("}\n");
        out
    }
}

// =============================================================================
// DIGESTS
// =============================================================================

/// BLAKE3 hex digest of the sorted canonical graph.
pub fn canonical_digest(kus: &[KnowledgeUnit], rus: &[ReasoningUnit]) -> Result<String, CairnError> {
    let mut nodes: Vec<(&str, &str)> = kus
        .iter()
        .map(|ku| (ku.id.as_str(), ku.claim.as_str()))
        .collect();
    nodes.sort_unstable();

    let mut edges: Vec<(&str, &str, Vec<&str>, u64, u64)> = rus
        .iter()
        .map(|ru| {
            (
                ru.reason_id.as_str(),
                ru.relation.as_str(),
                ru.knowledge_ids.iter().map(|id| id.as_str()).collect(),
                ru.shared_ngram_count,
                ru.score.to_bits(),
            )
        })
        .collect();
    edges.sort_unstable();

    let canonical = CanonicalGraph {
        magic: EXPORT_MAGIC,
        version: EXPORT_VERSION,
        nodes,
        edges,
    };
    let bytes = postcard::to_allocvec(&canonical)
        .map_err(|e| CairnError::SerializationError(format!("canonical graph: {}", e)))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// BLAKE3 hex digest of a file's bytes; `None` when the file does not exist.
pub fn hash_file(path: &Path) -> Result<Option<String>, CairnError> {
    if !path.exists() {
        return Ok(None);
    }
    let mut file = std::fs::File::open(path)
        .map_err(|e| CairnError::IoError(format!("{}: {}", path.display(), e)))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| CairnError::IoError(format!("{}: {}", path.display(), e)))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Some(hasher.finalize().to_hex().to_string()))
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

fn dot_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' | '\r' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================
