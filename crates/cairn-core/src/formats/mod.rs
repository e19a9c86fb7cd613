//! # Formats Module
//!
//! On-disk record formats for Cairn.
//!
//! Logs are line-delimited JSON: one record per line, `\n` terminated, never
//! rewritten. File I/O lives in [`crate::storage`]; this module only encodes and
//! decodes.

mod jsonl;

pub use jsonl::*;
