//! # JSON Lines Record Format
//!
//! Format: one JSON object per line, terminated by `\n`.
//!
//! Decoding is strict. A log is only written by the append path, which never
//! produces blank lines, unterminated lines or repeated ids, so any of those
//! means the file was damaged and is reported as an integrity error naming the
//! line number and byte offset.
//!
//! ## Size limits
//!
//! Each line is bounded by `MAX_RECORD_LINE_LENGTH` before it reaches the JSON
//! parser, so a corrupted log cannot force an unbounded allocation.

use crate::primitives::MAX_RECORD_LINE_LENGTH;
use crate::{CairnError, KnowledgeUnit, ReasoningUnit};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::io::{BufRead, Read};

// =============================================================================
// RECORD TRAIT
// =============================================================================

/// A record that can live in an append-only log.
pub trait LogRecord: Serialize + DeserializeOwned + Clone {
    /// Human-readable record kind used in diagnostics.
    const KIND: &'static str;

    /// The record's content-derived identifier.
    fn record_id(&self) -> &str;

    /// True when both records carry the same *addressed* content, i.e. the
    /// fields their identifier is hashed from.
    ///
    /// Two records with one id but different addressed content are a
    /// collision. Fields outside the address (audit data such as the query
    /// that triggered promotion) do not take part.
    fn same_content(&self, other: &Self) -> bool;
}

impl LogRecord for KnowledgeUnit {
    const KIND: &'static str = "knowledge";

    fn record_id(&self) -> &str {
        self.id.as_str()
    }

    fn same_content(&self, other: &Self) -> bool {
        self.claim == other.claim && self.sources == other.sources
    }
}

impl LogRecord for ReasoningUnit {
    const KIND: &'static str = "reasoning";

    fn record_id(&self) -> &str {
        self.reason_id.as_str()
    }

    fn same_content(&self, other: &Self) -> bool {
        self.relation == other.relation && self.knowledge_ids == other.knowledge_ids
    }
}

/// A decoded record together with its position in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRecord<R> {
    /// Byte offset of the first byte of the line.
    pub offset: u64,
    /// 1-based line number.
    pub line: usize,
    pub record: R,
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encode a record as one `\n`-terminated JSON line.
///
/// This is a pure transformation - no file I/O.
pub fn encode_line<R: LogRecord>(record: &R) -> Result<Vec<u8>, CairnError> {
    let mut line = serde_json::to_vec(record)
        .map_err(|e| CairnError::SerializationError(format!("{} record: {}", R::KIND, e)))?;
    if line.len() > MAX_RECORD_LINE_LENGTH {
        return Err(CairnError::SerializationError(format!(
            "{} record {} encodes to {} bytes, above the {} byte limit",
            R::KIND,
            record.record_id(),
            line.len(),
            MAX_RECORD_LINE_LENGTH
        )));
    }
    line.push(b'\n');
    Ok(line)
}

// =============================================================================
// DECODING
// =============================================================================

/// Decode a single line (with or without its trailing `\n`).
pub fn decode_line<R: LogRecord>(bytes: &[u8], line: usize, offset: u64) -> Result<R, CairnError> {
    let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(malformed::<R>(line, offset, "blank line"));
    }
    serde_json::from_slice(body).map_err(|e| malformed::<R>(line, offset, &e.to_string()))
}

/// Replay a whole log from a reader, in file order.
///
/// Fails on the first malformed line, on a torn (unterminated) final line,
/// and on a repeated record id.
pub fn replay<R: LogRecord, B: BufRead>(mut reader: B) -> Result<Vec<LoggedRecord<R>>, CairnError> {
    let mut records = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut offset = 0u64;
    let mut line = 0usize;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let limit = (MAX_RECORD_LINE_LENGTH + 1) as u64;
        let read = reader
            .by_ref()
            .take(limit)
            .read_until(b'\n', &mut buf)
            .map_err(|e| CairnError::IoError(format!("reading {} log: {}", R::KIND, e)))?;
        if read == 0 {
            break;
        }
        line += 1;

        if !buf.ends_with(b"\n") {
            let reason = if buf.len() > MAX_RECORD_LINE_LENGTH {
                "line exceeds maximum record length"
            } else {
                "unterminated final line (torn write)"
            };
            return Err(malformed::<R>(line, offset, reason));
        }

        let record: R = decode_line(&buf, line, offset)?;
        if !seen.insert(record.record_id().to_string()) {
            return Err(CairnError::DuplicateRecord {
                kind: R::KIND,
                id: record.record_id().to_string(),
                line,
            });
        }
        records.push(LoggedRecord {
            offset,
            line,
            record,
        });
        offset += read as u64;
    }

    Ok(records)
}

/// Replay a log held in memory.
///
/// This is a pure function of the log bytes.
pub fn decode_log<R: LogRecord>(bytes: &[u8]) -> Result<Vec<LoggedRecord<R>>, CairnError> {
    replay(bytes)
}

fn malformed<R: LogRecord>(line: usize, offset: u64, reason: &str) -> CairnError {
    CairnError::MalformedRecord {
        kind: R::KIND,
        line,
        offset,
        reason: reason.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
