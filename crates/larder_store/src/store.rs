//! Record store trait definition.

use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use larder_model::{ChangeRecord, EntityKey, RecordId};

/// A persistent store for [`ChangeRecord`]s.
///
/// Stores are dumb containers: they persist records and answer the exact
/// queries the ledger needs. All coalescing, lifecycle, and ordering
/// *rules* live in the ledger; stores only guarantee the invariants
/// below.
///
/// # Invariants
///
/// - Every mutation is atomic per record: a reader never observes a
///   torn record.
/// - `unsynced_for_location` returns records ascending by `created_at`,
///   ties broken by record ID, so push order is stable.
/// - `synced_for_location` returns records descending by `synced_at`.
/// - Implementations must be `Send + Sync` for concurrent access.
///
/// # Implementors
///
/// - [`crate::MemoryStore`] - For testing and ephemeral ledgers
/// - [`crate::FileStore`] - For persistent storage
pub trait RecordStore: Send + Sync {
    /// Inserts a new record.
    fn insert(&self, record: ChangeRecord) -> StoreResult<()>;

    /// Replaces an existing record by ID.
    ///
    /// Returns false if no record with that ID exists.
    fn update(&self, record: &ChangeRecord) -> StoreResult<bool>;

    /// Removes a record by ID.
    ///
    /// Returns false if no record with that ID exists.
    fn remove(&self, id: RecordId) -> StoreResult<bool>;

    /// Returns the record with the given ID, if any.
    fn get(&self, id: RecordId) -> StoreResult<Option<ChangeRecord>>;

    /// Returns the single Pending or Failed record for a coalescing key.
    ///
    /// The ledger guarantees at most one such record exists per key.
    fn live_for_key(&self, key: &EntityKey) -> StoreResult<Option<ChangeRecord>>;

    /// Returns all Pending and Failed records for a location scope,
    /// ascending by `created_at` (ties broken by record ID).
    fn unsynced_for_location(&self, location_id: &str) -> StoreResult<Vec<ChangeRecord>>;

    /// Returns the most recent Synced records for a location scope,
    /// descending by `synced_at`, bounded by `limit`.
    fn synced_for_location(&self, location_id: &str, limit: usize)
        -> StoreResult<Vec<ChangeRecord>>;

    /// Returns all Synced records for a coalescing key.
    fn synced_for_key(&self, key: &EntityKey) -> StoreResult<Vec<ChangeRecord>>;

    /// Removes every record for a coalescing key, regardless of status.
    ///
    /// Returns the number of records removed.
    fn remove_for_key(&self, key: &EntityKey) -> StoreResult<usize>;

    /// Removes Synced records whose `synced_at` is before `cutoff`.
    ///
    /// Pending and Failed records are never touched. Returns the number
    /// of records removed.
    fn remove_synced_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;

    /// Returns the maximum `synced_at` among Synced records for a
    /// location scope, if any.
    fn max_synced_at(&self, location_id: &str) -> StoreResult<Option<DateTime<Utc>>>;

    /// Returns the total number of records in the store.
    fn len(&self) -> StoreResult<usize>;

    /// Returns true if the store holds no records.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
