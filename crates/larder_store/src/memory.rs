//! In-memory record store.

use crate::error::StoreResult;
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use larder_model::{ChangeRecord, EntityKey, RecordId, SyncStatus};
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory record store.
///
/// Suitable for unit tests, integration tests, and ephemeral ledgers
/// that don't need persistence.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordId, ChangeRecord>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with records.
    ///
    /// Useful for testing recovery and janitor scenarios.
    #[must_use]
    pub fn with_records(records: Vec<ChangeRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.id, r)).collect();
        Self {
            records: RwLock::new(map),
        }
    }

    /// Returns a copy of every record in the store, in no particular
    /// order.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ChangeRecord> {
        self.records.read().values().cloned().collect()
    }
}

/// Sorts unsynced records into stable push order.
pub(crate) fn push_order(records: &mut [ChangeRecord]) {
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl RecordStore for MemoryStore {
    fn insert(&self, record: ChangeRecord) -> StoreResult<()> {
        self.records.write().insert(record.id, record);
        Ok(())
    }

    fn update(&self, record: &ChangeRecord) -> StoreResult<bool> {
        let mut records = self.records.write();
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, id: RecordId) -> StoreResult<bool> {
        Ok(self.records.write().remove(&id).is_some())
    }

    fn get(&self, id: RecordId) -> StoreResult<Option<ChangeRecord>> {
        Ok(self.records.read().get(&id).cloned())
    }

    fn live_for_key(&self, key: &EntityKey) -> StoreResult<Option<ChangeRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .find(|r| r.status.is_unsynced() && &r.key() == key)
            .cloned())
    }

    fn unsynced_for_location(&self, location_id: &str) -> StoreResult<Vec<ChangeRecord>> {
        let mut out: Vec<ChangeRecord> = self
            .records
            .read()
            .values()
            .filter(|r| r.status.is_unsynced() && r.location_id == location_id)
            .cloned()
            .collect();
        push_order(&mut out);
        Ok(out)
    }

    fn synced_for_location(
        &self,
        location_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<ChangeRecord>> {
        let mut out: Vec<ChangeRecord> = self
            .records
            .read()
            .values()
            .filter(|r| r.status == SyncStatus::Synced && r.location_id == location_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.synced_at.cmp(&a.synced_at).then_with(|| b.id.cmp(&a.id)));
        out.truncate(limit);
        Ok(out)
    }

    fn synced_for_key(&self, key: &EntityKey) -> StoreResult<Vec<ChangeRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.status == SyncStatus::Synced && &r.key() == key)
            .cloned()
            .collect())
    }

    fn remove_for_key(&self, key: &EntityKey) -> StoreResult<usize> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| &r.key() != key);
        Ok(before - records.len())
    }

    fn remove_synced_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| {
            !(r.status == SyncStatus::Synced && r.synced_at.is_some_and(|at| at < cutoff))
        });
        Ok(before - records.len())
    }

    fn max_synced_at(&self, location_id: &str) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.status == SyncStatus::Synced && r.location_id == location_id)
            .filter_map(|r| r.synced_at)
            .max())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.records.read().len())
    }
}
