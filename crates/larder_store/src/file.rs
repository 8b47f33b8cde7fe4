//! File-backed record store.

use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryStore;
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use larder_model::{ChangeRecord, EntityKey, RecordId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// One entry in the on-disk oplog.
#[derive(Debug, Serialize, Deserialize)]
enum LogEntry {
    /// A record was inserted or replaced.
    Upsert(ChangeRecord),
    /// A record was removed.
    Remove(RecordId),
}

/// A file-backed record store.
///
/// Records are persisted as an append-only oplog of length-prefixed CBOR
/// frames (`u32` little-endian length, then the frame bytes). The full
/// log is replayed into memory on open; a partial trailing frame left by
/// a crash is truncated away. [`FileStore::compact`] rewrites the log as
/// one `Upsert` per live record.
///
/// Every mutation is flushed to the OS before it is applied to the
/// in-memory view, so an acknowledged write is never lost by a process
/// crash. Call [`FileStore::sync`] at durability points to also force
/// data to disk.
///
/// # Thread Safety
///
/// This store is thread-safe; mutations are serialized on the log file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    log: Mutex<File>,
    cache: MemoryStore,
}

impl FileStore {
    /// Opens or creates a file store at the given path, replaying any
    /// existing oplog.
    ///
    /// Incomplete or undecodable trailing data is treated as a crash
    /// artifact and truncated away.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, read, or
    /// truncated.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let cache = MemoryStore::new();
        let mut offset = 0usize;
        while offset + 4 <= buf.len() {
            let header: [u8; 4] = buf[offset..offset + 4]
                .try_into()
                .map_err(|_| StoreError::corrupted("truncated frame header"))?;
            let len = u32::from_le_bytes(header) as usize;
            let end = offset + 4 + len;
            if end > buf.len() {
                // Partial trailing frame from an interrupted append.
                break;
            }
            match ciborium::de::from_reader::<LogEntry, _>(&buf[offset + 4..end]) {
                Ok(LogEntry::Upsert(record)) => {
                    cache.insert(record)?;
                }
                Ok(LogEntry::Remove(id)) => {
                    cache.remove(id)?;
                }
                Err(_) => break,
            }
            offset = end;
        }

        if offset < buf.len() {
            // Drop the unreadable tail so future appends start clean.
            file.set_len(offset as u64)?;
        }
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            log: Mutex::new(file),
            cache,
        })
    }

    /// Opens or creates a file store, creating parent directories if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file
    /// cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying oplog file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forces all appended data and file metadata to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    pub fn sync(&self) -> StoreResult<()> {
        self.log.lock().sync_all()?;
        Ok(())
    }

    /// Rewrites the oplog as one `Upsert` per live record, reclaiming
    /// space held by superseded and removed entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the rewritten log cannot be written or moved
    /// into place.
    pub fn compact(&self) -> StoreResult<()> {
        let mut log = self.log.lock();

        let tmp_path = self.path.with_extension("compact");
        let mut tmp = File::create(&tmp_path)?;
        for record in self.cache.snapshot() {
            let frame = encode_entry(&LogEntry::Upsert(record))?;
            tmp.write_all(&frame)?;
        }
        tmp.sync_all()?;
        std::fs::rename(&tmp_path, &self.path)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)?;
        file.seek(SeekFrom::End(0))?;
        *log = file;
        Ok(())
    }

    /// Appends one entry to the log while holding the log lock.
    fn append(log: &mut File, entry: &LogEntry) -> StoreResult<()> {
        let frame = encode_entry(entry)?;
        log.write_all(&frame)?;
        log.flush()?;
        Ok(())
    }
}

/// Encodes a log entry as a length-prefixed CBOR frame.
fn encode_entry(entry: &LogEntry) -> StoreResult<Vec<u8>> {
    let mut body = Vec::new();
    ciborium::ser::into_writer(entry, &mut body)
        .map_err(|e| StoreError::codec(e.to_string()))?;

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

impl RecordStore for FileStore {
    fn insert(&self, record: ChangeRecord) -> StoreResult<()> {
        let mut log = self.log.lock();
        Self::append(&mut log, &LogEntry::Upsert(record.clone()))?;
        self.cache.insert(record)
    }

    fn update(&self, record: &ChangeRecord) -> StoreResult<bool> {
        let mut log = self.log.lock();
        if self.cache.get(record.id)?.is_none() {
            return Ok(false);
        }
        Self::append(&mut log, &LogEntry::Upsert(record.clone()))?;
        self.cache.update(record)
    }

    fn remove(&self, id: RecordId) -> StoreResult<bool> {
        let mut log = self.log.lock();
        if self.cache.get(id)?.is_none() {
            return Ok(false);
        }
        Self::append(&mut log, &LogEntry::Remove(id))?;
        self.cache.remove(id)
    }

    fn get(&self, id: RecordId) -> StoreResult<Option<ChangeRecord>> {
        self.cache.get(id)
    }

    fn live_for_key(&self, key: &EntityKey) -> StoreResult<Option<ChangeRecord>> {
        self.cache.live_for_key(key)
    }

    fn unsynced_for_location(&self, location_id: &str) -> StoreResult<Vec<ChangeRecord>> {
        self.cache.unsynced_for_location(location_id)
    }

    fn synced_for_location(
        &self,
        location_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<ChangeRecord>> {
        self.cache.synced_for_location(location_id, limit)
    }

    fn synced_for_key(&self, key: &EntityKey) -> StoreResult<Vec<ChangeRecord>> {
        self.cache.synced_for_key(key)
    }

    fn remove_for_key(&self, key: &EntityKey) -> StoreResult<usize> {
        let mut log = self.log.lock();
        let doomed: Vec<RecordId> = self
            .cache
            .snapshot()
            .into_iter()
            .filter(|r| &r.key() == key)
            .map(|r| r.id)
            .collect();
        for id in &doomed {
            Self::append(&mut log, &LogEntry::Remove(*id))?;
            self.cache.remove(*id)?;
        }
        Ok(doomed.len())
    }

    fn remove_synced_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut log = self.log.lock();
        let doomed: Vec<RecordId> = self
            .cache
            .snapshot()
            .into_iter()
            .filter(|r| {
                r.status == larder_model::SyncStatus::Synced
                    && r.synced_at.is_some_and(|at| at < cutoff)
            })
            .map(|r| r.id)
            .collect();
        for id in &doomed {
            Self::append(&mut log, &LogEntry::Remove(*id))?;
            self.cache.remove(*id)?;
        }
        Ok(doomed.len())
    }

    fn max_synced_at(&self, location_id: &str) -> StoreResult<Option<DateTime<Utc>>> {
        self.cache.max_synced_at(location_id)
    }

    fn len(&self) -> StoreResult<usize> {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_model::OperationKind;
    use tempfile::TempDir;

    fn record(entity_id: &str) -> ChangeRecord {
        ChangeRecord::new(OperationKind::Update, "Recipe", entity_id, "loc-1", None)
    }

    fn log_path(dir: &TempDir) -> PathBuf {
        dir.path().join("ledger.log")
    }

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);

        let first = record("r-1");
        let mut second = record("r-2");
        {
            let store = FileStore::open(&path).unwrap();
            store.insert(first.clone()).unwrap();
            store.insert(second.clone()).unwrap();
            second.mark_failed("timeout");
            store.update(&second).unwrap();
            store.remove(first.id).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        let reloaded = store.get(second.id).unwrap().unwrap();
        assert_eq!(reloaded.last_error.as_deref(), Some("timeout"));
        assert_eq!(reloaded.attempt_count, 1);
    }

    #[test]
    fn partial_trailing_frame_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);

        let rec = record("r-1");
        {
            let store = FileStore::open(&path).unwrap();
            store.insert(rec.clone()).unwrap();
        }

        // Simulate a crash mid-append: a header promising more bytes
        // than were written.
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&100u32.to_le_bytes()).unwrap();
            file.write_all(&[0xAB, 0xCD]).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(rec.id).unwrap(), Some(rec.clone()));

        // The tail was truncated, so appends keep working across another
        // reopen.
        store.insert(record("r-2")).unwrap();
        drop(store);
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn compact_preserves_live_records() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);

        let store = FileStore::open(&path).unwrap();
        let keeper = record("r-keep");
        store.insert(keeper.clone()).unwrap();
        for i in 0..20 {
            let rec = record(&format!("r-{i}"));
            store.insert(rec.clone()).unwrap();
            store.remove(rec.id).unwrap();
        }

        let before = std::fs::metadata(&path).unwrap().len();
        store.compact().unwrap();
        let after = std::fs::metadata(&path).unwrap().len();
        assert!(after < before);
        assert_eq!(store.len().unwrap(), 1);

        drop(store);
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get(keeper.id).unwrap(), Some(keeper));
    }

    #[test]
    fn predicate_removals_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);

        {
            let store = FileStore::open(&path).unwrap();
            let mut synced = record("r-1");
            synced.mark_synced(Utc::now() - chrono::Duration::days(60));
            store.insert(synced).unwrap();
            store.insert(record("r-1")).unwrap();
            store.insert(record("r-2")).unwrap();

            assert_eq!(
                store
                    .remove_synced_before(Utc::now() - chrono::Duration::days(30))
                    .unwrap(),
                1
            );
            assert_eq!(
                store
                    .remove_for_key(&EntityKey::new("Recipe", "r-2"))
                    .unwrap(),
                1
            );
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(
            store
                .live_for_key(&EntityKey::new("Recipe", "r-1"))
                .unwrap()
                .map(|r| r.entity_id),
            Some("r-1".into())
        );
    }

    #[test]
    fn open_with_create_dirs_makes_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/ledger.log");

        let store = FileStore::open_with_create_dirs(&path).unwrap();
        store.insert(record("r-1")).unwrap();
        store.sync().unwrap();
        assert!(path.exists());
    }
}
