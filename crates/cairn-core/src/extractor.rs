//! # Claim Extraction
//!
//! Selects the single sentence of a retrieved chunk that best matches the
//! triggering query.
//!
//! Extraction is purely selective: the returned claim is a borrowed slice of
//! the chunk text, so it cannot contain anything that is not verbatim in the
//! source. There is no rewriting, no normalization of the output, and no
//! generation.

use crate::RetrievalHit;
use crate::primitives::DEFAULT_MAX_CLAIM_LENGTH;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Words ignored when matching query keywords.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "an", "and", "are", "as", "at", "be",
    "because", "been", "before", "being", "below", "between", "both", "but", "by", "can",
    "could", "did", "do", "does", "during", "each", "few", "for", "from", "further", "had",
    "has", "have", "he", "her", "here", "him", "his", "how", "i", "if", "in", "into", "is", "it",
    "its", "just", "may", "me", "might", "more", "most", "must", "my", "now", "of", "on", "once",
    "only", "or", "other", "our", "over", "own", "same", "shall", "she", "should", "so", "some",
    "such", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your",
];

/// Characters that may trail a terminal punctuation mark inside one sentence.
const CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201d}', '\u{2019}'];

/// Tunables for claim extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Sentences longer than this (bytes) are never selected.
    pub max_claim_length: usize,
    /// Additional stop words, matched case-insensitively.
    pub extra_stop_words: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_claim_length: DEFAULT_MAX_CLAIM_LENGTH,
            extra_stop_words: Vec::new(),
        }
    }
}

/// A sentence located inside a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentence<'a> {
    /// Byte offset of the sentence within the chunk.
    pub start: usize,
    /// Verbatim, trimmed sentence text.
    pub text: &'a str,
}

/// The selected claim for one retrieval hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim<'a> {
    /// Verbatim sentence text.
    pub text: &'a str,
    /// Index of the sentence within the chunk.
    pub position: usize,
    /// Number of distinct query keywords found in the sentence.
    pub keyword_hits: usize,
}

/// Keyword-overlap sentence selector.
#[derive(Debug, Clone)]
pub struct ClaimExtractor {
    max_claim_length: usize,
    stop_words: BTreeSet<String>,
}

impl Default for ClaimExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

impl ClaimExtractor {
    /// Create an extractor from configuration.
    #[must_use]
    pub fn new(config: &ExtractionConfig) -> Self {
        let mut stop_words: BTreeSet<String> = STOP_WORDS.iter().map(|w| (*w).to_string()).collect();
        stop_words.extend(config.extra_stop_words.iter().map(|w| w.to_lowercase()));
        Self {
            max_claim_length: config.max_claim_length,
            stop_words,
        }
    }

    /// Distinct, lower-cased, non-stop-word tokens of a query.
    #[must_use]
    pub fn keywords(&self, query: &str) -> BTreeSet<String> {
        tokens(query)
            .filter(|t| !self.stop_words.contains(t))
            .collect()
    }

    /// Select the best-matching sentence of a hit for a query.
    ///
    /// Sentences are scored by the number of distinct query keywords they
    /// contain; the earliest sentence wins ties. Returns `None` when the chunk
    /// has no candidate sentence.
    #[must_use]
    pub fn extract<'a>(&self, hit: &'a RetrievalHit, query: &str) -> Option<Claim<'a>> {
        let keywords = self.keywords(query);
        let mut best: Option<Claim<'a>> = None;

        for (position, sentence) in split_sentences(&hit.chunk_text).into_iter().enumerate() {
            if sentence.text.len() > self.max_claim_length {
                continue;
            }
            let words: BTreeSet<String> = tokens(sentence.text).collect();
            let keyword_hits = keywords.iter().filter(|k| words.contains(*k)).count();

            let better = best.is_none_or(|b| keyword_hits > b.keyword_hits);
            if better {
                best = Some(Claim {
                    text: sentence.text,
                    position,
                    keyword_hits,
                });
            }
        }

        best
    }
}

/// Lower-cased alphanumeric tokens.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Split text into verbatim, trimmed sentences.
///
/// Boundaries are a run of `.`, `!` or `?` (plus closing quotes/brackets)
/// followed by whitespace or end of text, and blank lines. Fragments without
/// any alphanumeric character are dropped.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<Sentence<'_>> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let byte_at = |i: usize| chars.get(i).map_or(text.len(), |(b, _)| *b);

    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i].1;
        let boundary = if matches!(c, '.' | '!' | '?') {
            let mut j = i + 1;
            while j < chars.len() && (matches!(chars[j].1, '.' | '!' | '?') || CLOSERS.contains(&chars[j].1)) {
                j += 1;
            }
            if j == chars.len() || chars[j].1.is_whitespace() {
                Some((byte_at(j), j))
            } else {
                None
            }
        } else if c == '\n' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].1 != '\n' && chars[j].1.is_whitespace() {
                j += 1;
            }
            if j < chars.len() && chars[j].1 == '\n' {
                Some((chars[i].0, j + 1))
            } else {
                None
            }
        } else {
            None
        };

        match boundary {
            Some((end, resume)) => {
                push_sentence(text, start, end, &mut sentences);
                start = byte_at(resume);
                i = resume;
            }
            None => i += 1,
        }
    }
    push_sentence(text, start, text.len(), &mut sentences);

    sentences
}

fn push_sentence<'a>(text: &'a str, start: usize, end: usize, out: &mut Vec<Sentence<'a>>) {
    if start >= end {
        return;
    }
    let raw = &text[start..end];
    let trimmed = raw.trim();
    if !trimmed.chars().any(char::is_alphanumeric) {
        return;
    }
    let leading = raw.len() - raw.trim_start().len();
    out.push(Sentence {
        start: start + leading,
        text: trimmed,
    });
}

// =============================================================================
// TESTS
// =============================================================================
