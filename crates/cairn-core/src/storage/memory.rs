//! In-memory record log.
//!
//! Same contract as the file backend, without durability. Used by tests and
//! by dry runs that want to see what a promotion or reasoning pass would do.

use super::{AppendOutcome, RecordLog, require_id, resolve_existing};
use crate::CairnError;
use crate::formats::LogRecord;
use std::collections::BTreeMap;

/// Vector-backed log with an id → position map.
#[derive(Debug, Clone)]
pub struct MemoryLog<R> {
    records: Vec<R>,
    positions: BTreeMap<String, usize>,
}

impl<R> Default for MemoryLog<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            positions: BTreeMap::new(),
        }
    }
}

impl<R: LogRecord> MemoryLog<R> {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: LogRecord> RecordLog<R> for MemoryLog<R> {
    fn append(&mut self, record: &R) -> Result<AppendOutcome, CairnError> {
        require_id(record)?;
        let id = record.record_id().to_string();
        if let Some(&pos) = self.positions.get(&id) {
            return resolve_existing(self.records.get(pos).cloned(), record);
        }

        let position = self.records.len();
        self.records.push(record.clone());
        self.positions.insert(id.clone(), position);
        Ok(AppendOutcome::Appended {
            id,
            position: position as u64,
        })
    }

    fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    fn get(&self, id: &str) -> Result<Option<R>, CairnError> {
        Ok(self
            .positions
            .get(id)
            .and_then(|&pos| self.records.get(pos))
            .cloned())
    }

    fn load_all(&self) -> Result<Vec<R>, CairnError> {
        Ok(self.records.clone())
    }

    fn ids(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.record_id().to_string())
            .collect()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
