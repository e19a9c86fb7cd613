//! # Content Addressing
//!
//! Deterministic identifiers derived from record content.
//!
//! - Canonical bytes: a version byte, a domain tag, then every semantic field
//!   as a length-prefixed (u64 little-endian) byte string
//! - Hash: BLAKE3 over the canonical bytes
//! - Identifier: type tag (`ku_` / `ru_`) + first 32 hex characters
//!
//! Length prefixes make the framing unambiguous, so no two different field
//! lists share a canonical encoding. Identical content yields the identical
//! identifier on any machine and in any run; that is the whole basis of
//! idempotent promotion and reasoning.

use crate::primitives::{
    CANONICAL_VERSION, ID_HEX_LENGTH, KNOWLEDGE_ID_PREFIX, REASONING_ID_PREFIX,
};
use crate::{KnowledgeId, ReasonId, Relation, Source};

/// Domain tag for Knowledge Unit canonical bytes.
const KNOWLEDGE_DOMAIN: &[u8] = b"cairn/knowledge";

/// Domain tag for Reasoning Unit canonical bytes.
const REASONING_DOMAIN: &[u8] = b"cairn/reasoning";

/// Stateless identifier derivation.
pub struct ContentAddresser;

impl ContentAddresser {
    /// Identifier of a Knowledge Unit: a pure function of `(claim, sources)`.
    ///
    /// Source order is significant; it is the order the evidence was cited in.
    #[must_use]
    pub fn knowledge_id(claim: &str, sources: &[Source]) -> KnowledgeId {
        let bytes = Self::canonical_knowledge_bytes(claim, sources);
        KnowledgeId(Self::digest(KNOWLEDGE_ID_PREFIX, &bytes))
    }

    /// Identifier of a Reasoning Unit: a pure function of
    /// `(relation, sorted knowledge ids)`.
    ///
    /// The ids are sorted and de-duplicated here, so callers may pass them in
    /// any order.
    #[must_use]
    pub fn reasoning_id(relation: Relation, knowledge_ids: &[KnowledgeId]) -> ReasonId {
        let bytes = Self::canonical_reasoning_bytes(relation, knowledge_ids);
        ReasonId(Self::digest(REASONING_ID_PREFIX, &bytes))
    }

    /// Canonical byte representation of a Knowledge Unit payload.
    #[must_use]
    pub fn canonical_knowledge_bytes(claim: &str, sources: &[Source]) -> Vec<u8> {
        let mut out = CanonicalBytes::new(KNOWLEDGE_DOMAIN);
        out.field(claim.as_bytes());
        out.count(sources.len());
        for source in sources {
            out.field(source.author.as_bytes());
            out.field(source.title.as_bytes());
            out.field(source.path_relative.as_bytes());
            out.optional(source.page_range.as_deref().map(str::as_bytes));
            out.field(source.chunk_id.as_bytes());
        }
        out.finish()
    }

    /// Canonical byte representation of a Reasoning Unit payload.
    #[must_use]
    pub fn canonical_reasoning_bytes(relation: Relation, knowledge_ids: &[KnowledgeId]) -> Vec<u8> {
        let mut ids: Vec<&str> = knowledge_ids.iter().map(KnowledgeId::as_str).collect();
        ids.sort_unstable();
        ids.dedup();

        let mut out = CanonicalBytes::new(REASONING_DOMAIN);
        out.field(relation.as_str().as_bytes());
        out.count(ids.len());
        for id in ids {
            out.field(id.as_bytes());
        }
        out.finish()
    }

    /// Hash canonical bytes and render a tagged, truncated hex identifier.
    #[must_use]
    pub fn digest(prefix: &str, canonical: &[u8]) -> String {
        let hash = blake3::hash(canonical);
        let hex = hash.to_hex();
        let mut id = String::with_capacity(prefix.len() + ID_HEX_LENGTH);
        id.push_str(prefix);
        id.push_str(&hex.as_str()[..ID_HEX_LENGTH]);
        id
    }
}

/// Append-only canonical encoder.
struct CanonicalBytes {
    buf: Vec<u8>,
}

impl CanonicalBytes {
    fn new(domain: &[u8]) -> Self {
        let mut this = Self {
            buf: Vec::with_capacity(256),
        };
        this.buf.push(CANONICAL_VERSION);
        this.field(domain);
        this
    }

    fn count(&mut self, n: usize) {
        self.buf.extend_from_slice(&(n as u64).to_le_bytes());
    }

    fn field(&mut self, bytes: &[u8]) {
        self.count(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    fn optional(&mut self, bytes: Option<&[u8]>) {
        match bytes {
            Some(b) => {
                self.buf.push(1);
                self.field(b);
            }
            None => self.buf.push(0),
        }
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn source(path: &str, chunk: &str) -> Source {
        Source {
            author: "Locke".to_string(),
            title: "Essay".to_string(),
            path_relative: path.to_string(),
            page_range: None,
            chunk_id: chunk.to_string(),
        }
    }

    #[test]
    fn knowledge_id_has_prefix_and_fixed_width() {
        let id = ContentAddresser::knowledge_id("Claim.", &[source("a.pdf", "1")]);
        assert!(id.as_str().starts_with("ku_"));
        assert_eq!(id.as_str().len(), 3 + ID_HEX_LENGTH);
        assert!(id.as_str()[3..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn identical_input_identical_id() {
        let sources = vec![source("a.pdf", "1"), source("b.pdf", "7")];
        let a = ContentAddresser::knowledge_id("Memory is retention.", &sources);
        let b = ContentAddresser::knowledge_id("Memory is retention.", &sources.clone());
        assert_eq!(a, b);
    }

    #[test]
    fn known_vector_is_stable() {
        // Pinned: any change here changes every identifier ever written.
        let bytes = ContentAddresser::canonical_knowledge_bytes("x", &[]);
        let mut expected = vec![CANONICAL_VERSION, 15, 0, 0, 0, 0, 0, 0, 0];
        expected.extend_from_slice(b"cairn/knowledge");
        expected.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 0, b'x']);
        expected.extend_from_slice(&[0; 8]);
        assert_eq!(bytes, expected);
        assert_eq!(
            ContentAddresser::knowledge_id("x", &[]).as_str(),
            "ku_f912284878cdc83e9e15f17e3564d8c2"
        );

        let claim = "Memory is the retention of past impressions.";
        let ku = ContentAddresser::knowledge_id(claim, &[source("a.pdf", "1")]);
        assert_eq!(ku.as_str(), "ku_4d308f60d802040aeea94fd137c9532d");

        let other = KnowledgeId::new("ku_00000000000000000000000000000000");
        let ru = ContentAddresser::reasoning_id(Relation::Support, &[ku, other]);
        assert_eq!(ru.as_str(), "ru_668489ae5026d3efc447f6617e95c36e");
    }

    #[test]
    fn source_change_changes_id() {
        let a = ContentAddresser::knowledge_id("Claim.", &[source("a.pdf", "1")]);
        let b = ContentAddresser::knowledge_id("Claim.", &[source("a.pdf", "2")]);
        assert_ne!(a, b);
    }

    #[test]
    fn page_range_none_differs_from_empty() {
        let mut with_empty = source("a.pdf", "1");
        with_empty.page_range = Some(String::new());
        let a = ContentAddresser::knowledge_id("Claim.", &[source("a.pdf", "1")]);
        let b = ContentAddresser::knowledge_id("Claim.", &[with_empty]);
        assert_ne!(a, b);
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let mut left = source("ab", "c");
        left.title = String::new();
        let mut right = source("a", "bc");
        right.title = String::new();
        assert_ne!(
            ContentAddresser::knowledge_id("", &[left]),
            ContentAddresser::knowledge_id("", &[right])
        );
    }

    #[test]
    fn reasoning_id_ignores_input_order() {
        let a = KnowledgeId::new("ku_a");
        let b = KnowledgeId::new("ku_b");
        let forward = ContentAddresser::reasoning_id(Relation::Support, &[a.clone(), b.clone()]);
        let backward = ContentAddresser::reasoning_id(Relation::Support, &[b, a]);
        assert_eq!(forward, backward);
        assert!(forward.as_str().starts_with("ru_"));
    }

    #[test]
    fn reasoning_id_depends_on_relation() {
        let ids = [KnowledgeId::new("ku_a"), KnowledgeId::new("ku_b")];
        assert_ne!(
            ContentAddresser::reasoning_id(Relation::Support, &ids),
            ContentAddresser::reasoning_id(Relation::Conflict, &ids)
        );
    }
}
