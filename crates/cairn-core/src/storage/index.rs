//! # redb-backed Offset Index
//!
//! Persists the id → byte-offset map of a JSON Lines log so a store can be
//! reopened without replaying the whole log.
//!
//! The index is derived data. It records the log length and record count it
//! describes; when either disagrees with the log on disk, the owner discards
//! it and rebuilds from the log. Losing or corrupting it never loses records.
//!
//! An open index also holds redb's exclusive file lock, which makes it the
//! single-writer lock of the log it describes.

use crate::CairnError;
use redb::{
    Database, DatabaseError, ReadableDatabase, ReadableTable, StorageError, TableDefinition,
};
use std::path::{Path, PathBuf};

/// Table for offsets: record id -> byte offset of its line.
const OFFSETS: TableDefinition<&str, u64> = TableDefinition::new("offsets");

/// Table for metadata: key string -> value u64.
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const KEY_LOG_LENGTH: &str = "log_length";
const KEY_RECORD_COUNT: &str = "record_count";
const KEY_FORMAT_VERSION: &str = "format_version";

/// Current index layout version.
pub const INDEX_FORMAT_VERSION: u64 = 1;

/// Everything an index knows, read in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSnapshot {
    /// `(id, offset)` sorted by offset, i.e. insertion order.
    pub entries: Vec<(String, u64)>,
    /// Log length (bytes) at the last indexed append.
    pub log_length: Option<u64>,
    /// Number of records at the last indexed append.
    pub record_count: Option<u64>,
    pub format_version: Option<u64>,
}

impl IndexSnapshot {
    /// True when this snapshot describes a log of exactly `log_length` bytes.
    #[must_use]
    pub fn describes(&self, log_length: u64) -> bool {
        self.format_version == Some(INDEX_FORMAT_VERSION)
            && self.log_length == Some(log_length)
            && self.record_count == Some(self.entries.len() as u64)
    }
}

/// A persisted offset index.
pub struct OffsetIndex {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for OffsetIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffsetIndex")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn index_err(e: impl std::fmt::Display) -> CairnError {
    CairnError::IndexError(e.to_string())
}

/// Classify a failure to open the database file.
///
/// Only unreadable contents map to [`CairnError::IndexError`], the one error
/// an owner may answer by rebuilding. A lock held by another writer, or an
/// I/O failure on a healthy file, is fatal.
fn open_err(path: &Path, e: DatabaseError) -> CairnError {
    match e {
        DatabaseError::DatabaseAlreadyOpen => CairnError::StoreLocked(path.display().to_string()),
        DatabaseError::Storage(StorageError::Io(io))
            if !matches!(
                io.kind(),
                std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData
            ) =>
        {
            CairnError::IoError(format!("{}: {}", path.display(), io))
        }
        other => index_err(other),
    }
}

impl OffsetIndex {
    /// Open or create an index at the given path.
    ///
    /// The returned value holds redb's file lock for as long as it lives, so
    /// a second open of the same path fails with [`CairnError::StoreLocked`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CairnError> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(|e| open_err(&path, e))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(index_err)?;
            let _ = write_txn.open_table(OFFSETS).map_err(index_err)?;
            let _ = write_txn.open_table(METADATA).map_err(index_err)?;
            write_txn.commit().map_err(index_err)?;
        }

        Ok(Self { db, path })
    }

    /// Open the index at `path` and replace its contents with `entries`.
    ///
    /// A file whose contents redb cannot read is deleted and recreated. Any
    /// other open failure, a held lock included, is returned unchanged.
    pub fn rebuild(
        path: impl AsRef<Path>,
        entries: &[(String, u64)],
        log_length: u64,
    ) -> Result<Self, CairnError> {
        let path = path.as_ref();
        let index = match Self::open(path) {
            Ok(index) => index,
            Err(CairnError::IndexError(reason)) => {
                tracing::warn!("Discarding unreadable index {}: {}", path.display(), reason);
                std::fs::remove_file(path).map_err(|e| {
                    CairnError::IndexError(format!("removing unreadable index {}: {}", path.display(), e))
                })?;
                Self::open(path)?
            }
            Err(e) => return Err(e),
        };
        index.reset(entries, log_length)?;
        Ok(index)
    }

    /// Replace every entry and the metadata in one transaction.
    pub fn reset(&self, entries: &[(String, u64)], log_length: u64) -> Result<(), CairnError> {
        let write_txn = self.db.begin_write().map_err(index_err)?;
        write_txn.delete_table(OFFSETS).map_err(index_err)?;
        {
            let mut offsets = write_txn.open_table(OFFSETS).map_err(index_err)?;
            for (id, offset) in entries {
                offsets.insert(id.as_str(), *offset).map_err(index_err)?;
            }
            let mut meta = write_txn.open_table(METADATA).map_err(index_err)?;
            meta.insert(KEY_LOG_LENGTH, log_length).map_err(index_err)?;
            meta.insert(KEY_RECORD_COUNT, entries.len() as u64)
                .map_err(index_err)?;
            meta.insert(KEY_FORMAT_VERSION, INDEX_FORMAT_VERSION)
                .map_err(index_err)?;
        }
        write_txn.commit().map_err(index_err)?;
        Ok(())
    }

    /// Record one appended line in a single ACID transaction.
    pub fn record(
        &self,
        id: &str,
        offset: u64,
        log_length: u64,
        record_count: u64,
    ) -> Result<(), CairnError> {
        let write_txn = self.db.begin_write().map_err(index_err)?;
        {
            let mut offsets = write_txn.open_table(OFFSETS).map_err(index_err)?;
            offsets.insert(id, offset).map_err(index_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(index_err)?;
            meta.insert(KEY_LOG_LENGTH, log_length).map_err(index_err)?;
            meta.insert(KEY_RECORD_COUNT, record_count)
                .map_err(index_err)?;
            meta.insert(KEY_FORMAT_VERSION, INDEX_FORMAT_VERSION)
                .map_err(index_err)?;
        }
        write_txn.commit().map_err(index_err)?;
        Ok(())
    }

    /// Read the full index.
    pub fn snapshot(&self) -> Result<IndexSnapshot, CairnError> {
        let read_txn = self.db.begin_read().map_err(index_err)?;

        let mut entries = Vec::new();
        {
            let table = read_txn.open_table(OFFSETS).map_err(index_err)?;
            for entry in table.iter().map_err(index_err)? {
                let (key, value) = entry.map_err(index_err)?;
                entries.push((key.value().to_string(), value.value()));
            }
        }
        entries.sort_by_key(|(_, offset)| *offset);

        let meta = read_txn.open_table(METADATA).map_err(index_err)?;
        let read_meta = |key: &str| -> Result<Option<u64>, CairnError> {
            Ok(meta.get(key).map_err(index_err)?.map(|v| v.value()))
        };

        Ok(IndexSnapshot {
            entries,
            log_length: read_meta(KEY_LOG_LENGTH)?,
            record_count: read_meta(KEY_RECORD_COUNT)?,
            format_version: read_meta(KEY_FORMAT_VERSION)?,
        })
    }

    /// Path of the index file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_index_describes_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let index = OffsetIndex::open(dir.path().join("x.idx")).expect("open");
        let snap = index.snapshot().expect("snapshot");
        assert!(snap.entries.is_empty());
        assert!(!snap.describes(0));
    }

    #[test]
    fn recorded_entries_come_back_in_offset_order() {
        let dir = TempDir::new().expect("tempdir");
        let index = OffsetIndex::open(dir.path().join("x.idx")).expect("open");
        // Keys sort opposite to offsets.
        index.record("ku_b", 0, 10, 1).expect("record");
        index.record("ku_a", 10, 25, 2).expect("record");

        let snap = index.snapshot().expect("snapshot");
        assert_eq!(
            snap.entries,
            vec![("ku_b".to_string(), 0), ("ku_a".to_string(), 10)]
        );
        assert!(snap.describes(25));
        assert!(!snap.describes(26));
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("x.idx");
        {
            let index = OffsetIndex::open(&path).expect("open");
            index.record("ku_old", 0, 5, 1).expect("record");
        }
        let index =
            OffsetIndex::rebuild(&path, &[("ku_new".to_string(), 0)], 7).expect("rebuild");
        let snap = index.snapshot().expect("snapshot");
        assert_eq!(snap.entries, vec![("ku_new".to_string(), 0)]);
        assert!(snap.describes(7));
    }

    #[test]
    fn reset_keeps_the_open_handle() {
        let dir = TempDir::new().expect("tempdir");
        let index = OffsetIndex::open(dir.path().join("x.idx")).expect("open");
        index.record("ku_old", 0, 5, 1).expect("record");
        index
            .reset(&[("ku_a".to_string(), 0), ("ku_b".to_string(), 4)], 9)
            .expect("reset");
        let snap = index.snapshot().expect("snapshot");
        assert_eq!(snap.entries.len(), 2);
        assert!(snap.describes(9));
    }

    #[test]
    fn garbage_file_is_rebuilt() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("x.idx");
        std::fs::write(&path, b"not a redb file at all").expect("write");
        let index = OffsetIndex::rebuild(&path, &[("ku_a".to_string(), 0)], 3).expect("rebuild");
        assert!(index.snapshot().expect("snapshot").describes(3));
    }

    #[test]
    fn second_open_is_locked_out() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("x.idx");
        let held = OffsetIndex::open(&path).expect("open");
        held.record("ku_a", 0, 9, 1).expect("record");

        let err = OffsetIndex::open(&path).expect_err("second open");
        assert!(matches!(err, CairnError::StoreLocked(_)));
        let err = OffsetIndex::rebuild(&path, &[], 0).expect_err("second rebuild");
        assert!(matches!(err, CairnError::StoreLocked(_)));

        // The holder's contents are untouched.
        assert!(held.snapshot().expect("snapshot").describes(9));
        assert!(path.exists());
    }

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("x.idx");
        {
            let index = OffsetIndex::open(&path).expect("open");
            index.record("ku_a", 0, 9, 1).expect("record");
        }
        let index = OffsetIndex::open(&path).expect("reopen");
        assert!(index.snapshot().expect("snapshot").describes(9));
    }
}
