//! # JSON Lines Record Log
//!
//! File-backed [`RecordLog`]. The log file is the source of truth; the
//! id → offset map is rebuilt by replay on open, or loaded from a redb
//! [`OffsetIndex`] when one exists and still describes the file.
//!
//! ## Write path
//!
//! 1. Check the in-memory index (no file read unless the id is known)
//! 2. Encode exactly one `\n`-terminated line
//! 3. `write_all` + `sync_data`
//! 4. On failure, truncate back to the previous length so no torn line stays
//! 5. Update the in-memory index, then the persisted one
//!
//! A persisted index that fails to update is only stale; the next open
//! notices the length mismatch and rebuilds it.
//!
//! ## Opening for write
//!
//! [`JsonlLog::open_indexed`] holds the redb index for the life of the log,
//! which locks out every other writer. Under that lock a crash-torn final
//! line is cut back to the last `\n` before anything is replayed.

use super::index::OffsetIndex;
use super::{AppendOutcome, RecordLog, require_id, resolve_existing};
use crate::CairnError;
use crate::formats::{LogRecord, LoggedRecord, decode_line, encode_line, replay};
use crate::primitives::MAX_RECORD_LINE_LENGTH;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Append-only JSON Lines log.
#[derive(Debug)]
pub struct JsonlLog<R> {
    path: PathBuf,
    writer: File,
    /// Current file length; the offset the next line will start at.
    end: u64,
    /// `(id, offset)` in insertion order.
    entries: Vec<(String, u64)>,
    /// id -> index into `entries`.
    positions: BTreeMap<String, usize>,
    /// Persisted index; while held, also the writer lock.
    index: Option<OffsetIndex>,
    /// Bytes of the next line to write before failing.
    #[cfg(test)]
    fail_next_write: Option<usize>,
    _record: PhantomData<R>,
}

fn io_err(path: &Path, e: std::io::Error) -> CairnError {
    CairnError::IoError(format!("{}: {}", path.display(), e))
}

impl<R: LogRecord> JsonlLog<R> {
    /// Open (or create) a log and index it by full replay.
    ///
    /// Takes no lock and repairs nothing; a torn final line is reported as
    /// malformed. Writers go through [`JsonlLog::open_indexed`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CairnError> {
        let (path, writer, end) = Self::open_file(path.as_ref())?;
        let entries = Self::scan(&path)?;
        Ok(Self::assemble(path, writer, end, entries, None))
    }

    /// Open (or create) a log together with its persisted offset index.
    ///
    /// The index is opened first and held for the life of the log, so it is
    /// also the writer lock: a second open of the same paths fails with
    /// [`CairnError::StoreLocked`] and never touches the index.
    ///
    /// Under the lock, an unterminated final line left by an interrupted
    /// append is cut off. The index is trusted only when it records exactly
    /// the resulting file length and record count; otherwise it is rebuilt
    /// from the log.
    pub fn open_indexed(
        path: impl AsRef<Path>,
        index_path: impl AsRef<Path>,
    ) -> Result<Self, CairnError> {
        let (path, writer, end) = Self::open_file(path.as_ref())?;
        let index_path = index_path.as_ref();

        let index = match OffsetIndex::open(index_path) {
            Ok(index) => index,
            // Unreadable contents only; a held lock or I/O failure is fatal.
            Err(CairnError::IndexError(_)) => OffsetIndex::rebuild(index_path, &[], 0)?,
            Err(e) => return Err(e),
        };
        let end = Self::repair_torn_tail(&path, &writer, end)?;

        let entries = match index.snapshot() {
            Ok(snapshot) if snapshot.describes(end) => snapshot.entries,
            outcome => {
                match outcome {
                    Err(e) => tracing::warn!(
                        "Offset index {} unreadable ({}), rebuilding",
                        index_path.display(),
                        e
                    ),
                    Ok(_) if end > 0 => tracing::warn!(
                        "Offset index {} is stale for {}, rebuilding",
                        index_path.display(),
                        path.display()
                    ),
                    Ok(_) => {}
                }
                let entries = Self::scan(&path)?;
                index.reset(&entries, end)?;
                entries
            }
        };

        Ok(Self::assemble(path, writer, end, entries, Some(index)))
    }

    fn open_file(path: &Path) -> Result<(PathBuf, File, u64), CairnError> {
        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        let end = writer.metadata().map_err(|e| io_err(path, e))?.len();
        Ok((path.to_path_buf(), writer, end))
    }

    /// Cut an unterminated final line and return the new file length.
    ///
    /// Only a tail no longer than one record line is cut. Anything longer is
    /// left in place for replay to report, as is every terminated line.
    fn repair_torn_tail(path: &Path, writer: &File, end: u64) -> Result<u64, CairnError> {
        if end == 0 {
            return Ok(0);
        }
        let mut file = File::open(path).map_err(|e| io_err(path, e))?;
        let mut last = [0u8; 1];
        file.seek(SeekFrom::Start(end - 1))
            .and_then(|_| file.read_exact(&mut last))
            .map_err(|e| io_err(path, e))?;
        if last[0] == b'\n' {
            return Ok(end);
        }

        let window = end.min((MAX_RECORD_LINE_LENGTH + 1) as u64);
        let start = end - window;
        let mut tail = Vec::new();
        file.seek(SeekFrom::Start(start))
            .and_then(|_| (&mut file).take(window).read_to_end(&mut tail))
            .map_err(|e| io_err(path, e))?;
        let cut = match tail.iter().rposition(|b| *b == b'\n') {
            Some(i) => start + i as u64 + 1,
            None if start == 0 => 0,
            None => return Ok(end),
        };

        writer
            .set_len(cut)
            .and_then(|()| writer.sync_data())
            .map_err(|e| io_err(path, e))?;
        tracing::warn!(
            "Truncated torn tail of {} bytes from {} at offset {}",
            end - cut,
            path.display(),
            cut
        );
        Ok(cut)
    }

    fn scan(path: &Path) -> Result<Vec<(String, u64)>, CairnError> {
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        Ok(replay::<R, _>(BufReader::new(file))?
            .into_iter()
            .map(|logged| (logged.record.record_id().to_string(), logged.offset))
            .collect())
    }

    fn assemble(
        path: PathBuf,
        writer: File,
        end: u64,
        entries: Vec<(String, u64)>,
        index: Option<OffsetIndex>,
    ) -> Self {
        let positions = entries
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (id.clone(), i))
            .collect();
        Self {
            path,
            writer,
            end,
            entries,
            positions,
            index,
            #[cfg(test)]
            fail_next_write: None,
            _record: PhantomData,
        }
    }

    /// Replay the whole file, keeping line numbers and offsets.
    pub fn replay_logged(&self) -> Result<Vec<LoggedRecord<R>>, CairnError> {
        let file = File::open(&self.path).map_err(|e| io_err(&self.path, e))?;
        replay(BufReader::new(file))
    }

    /// Discard the offset map (and persisted index, if any) and rebuild both
    /// from the log. Returns the number of records indexed.
    ///
    /// With a persisted index held, a torn final line is cut first, as on
    /// open.
    pub fn rebuild_index(&mut self) -> Result<usize, CairnError> {
        let length = self
            .writer
            .metadata()
            .map_err(|e| io_err(&self.path, e))?
            .len();
        self.end = match &self.index {
            Some(_) => Self::repair_torn_tail(&self.path, &self.writer, length)?,
            None => length,
        };
        let entries = Self::scan(&self.path)?;
        if let Some(index) = &self.index {
            index.reset(&entries, self.end)?;
        }
        let count = entries.len();
        self.positions = entries
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (id.clone(), i))
            .collect();
        self.entries = entries;
        Ok(count)
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the log file in bytes.
    #[must_use]
    pub fn log_length(&self) -> u64 {
        self.end
    }

    /// Byte offset of a record's line.
    #[must_use]
    pub fn offset_of(&self, id: &str) -> Option<u64> {
        self.positions
            .get(id)
            .and_then(|&i| self.entries.get(i))
            .map(|(_, offset)| *offset)
    }

    fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        #[cfg(test)]
        let line = match self.fail_next_write.take() {
            Some(keep) => {
                self.writer.write_all(&line[..keep.min(line.len())])?;
                return Err(std::io::Error::other("write interrupted"));
            }
            None => line,
        };
        self.writer.write_all(line)?;
        self.writer.sync_data()
    }
}

impl<R: LogRecord> RecordLog<R> for JsonlLog<R> {
    fn append(&mut self, record: &R) -> Result<AppendOutcome, CairnError> {
        require_id(record)?;
        let id = record.record_id().to_string();
        if self.positions.contains_key(&id) {
            return resolve_existing(self.get(&id)?, record);
        }

        let line = encode_line(record)?;
        let offset = self.end;
        if let Err(e) = self.write_line(&line) {
            if let Err(truncate) = self.writer.set_len(offset) {
                tracing::error!(
                    "Could not roll back partial write to {}: {}",
                    self.path.display(),
                    truncate
                );
            }
            return Err(io_err(&self.path, e));
        }

        self.end = offset + line.len() as u64;
        self.positions.insert(id.clone(), self.entries.len());
        self.entries.push((id.clone(), offset));

        if let Some(index) = &self.index {
            if let Err(e) = index.record(&id, offset, self.end, self.entries.len() as u64) {
                tracing::warn!("Offset index update failed for {}: {}", id, e);
            }
        }

        Ok(AppendOutcome::Appended {
            id,
            position: offset,
        })
    }

    fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    fn get(&self, id: &str) -> Result<Option<R>, CairnError> {
        let Some(&position) = self.positions.get(id) else {
            return Ok(None);
        };
        let Some((_, offset)) = self.entries.get(position) else {
            return Ok(None);
        };

        let mut file = File::open(&self.path).map_err(|e| io_err(&self.path, e))?;
        file.seek(SeekFrom::Start(*offset))
            .map_err(|e| io_err(&self.path, e))?;
        let mut buf = Vec::new();
        BufReader::new(file)
            .take((MAX_RECORD_LINE_LENGTH + 1) as u64)
            .read_until(b'\n', &mut buf)
            .map_err(|e| io_err(&self.path, e))?;

        let record: R = decode_line(&buf, position + 1, *offset)?;
        if record.record_id() != id {
            return Err(CairnError::IndexError(format!(
                "offset {} of {} holds {}, expected {}",
                offset,
                self.path.display(),
                record.record_id(),
                id
            )));
        }
        Ok(Some(record))
    }

    fn load_all(&self) -> Result<Vec<R>, CairnError> {
        Ok(self
            .replay_logged()?
            .into_iter()
            .map(|logged| logged.record)
            .collect())
    }

    fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================
