//! The modification ledger: coalescing change tracker and sync cursor.

use crate::error::{LedgerError, LedgerResult};
use crate::feed::{LedgerEvent, LedgerEventKind, LedgerFeed};
use chrono::{DateTime, Utc};
use larder_model::{ChangeRecord, EntityKey, OperationKind, RecordId, SyncStatus};
use larder_store::{MemoryStore, RecordStore};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{debug, warn};

/// The persistent log of unsynced and synced mutations per entity.
///
/// The ledger is shared mutable state touched by two independent
/// actors: the editing layer (synchronous with user actions) and a
/// background sync engine. Every write runs under a single mutex, which
/// serializes the read-modify-write coalescing cycle per key; readers
/// go straight to the store and are never blocked by conflict
/// detection.
///
/// # Invariants
///
/// - At most one Pending or Failed record exists per coalescing key.
/// - `unsynced` never returns a Synced record.
/// - The sync cursor for a scope never moves backward.
/// - Subscribers are notified only after the store mutation committed.
pub struct ChangeLedger {
    store: Arc<dyn RecordStore>,
    /// Serializes all ledger mutations.
    write_lock: Mutex<()>,
    /// Per-location cursor high-water marks.
    cursors: RwLock<HashMap<String, DateTime<Utc>>>,
    feed: LedgerFeed,
}

impl ChangeLedger {
    /// Creates a ledger over the given record store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            cursors: RwLock::new(HashMap::new()),
            feed: LedgerFeed::new(),
        }
    }

    /// Creates a ledger over a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Returns the notification feed for this ledger.
    pub fn feed(&self) -> &LedgerFeed {
        &self.feed
    }

    /// Subscribes to ledger events.
    pub fn subscribe(&self) -> Receiver<LedgerEvent> {
        self.feed.subscribe()
    }

    /// Tracks a local create of an entity.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] if a key field is empty, or
    /// [`LedgerError::DeletePending`] if a delete for the same key is
    /// still waiting to sync.
    pub fn track_create(
        &self,
        entity_type: &str,
        entity_id: &str,
        location_id: &str,
        entity_name: Option<String>,
    ) -> LedgerResult<()> {
        self.track(OperationKind::Create, entity_type, entity_id, location_id, entity_name)
    }

    /// Tracks a local update of an entity.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] if a key field is empty.
    pub fn track_update(
        &self,
        entity_type: &str,
        entity_id: &str,
        location_id: &str,
        entity_name: Option<String>,
    ) -> LedgerResult<()> {
        self.track(OperationKind::Update, entity_type, entity_id, location_id, entity_name)
    }

    /// Tracks a local delete of an entity.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] if a key field is empty.
    pub fn track_delete(
        &self,
        entity_type: &str,
        entity_id: &str,
        location_id: &str,
        entity_name: Option<String>,
    ) -> LedgerResult<()> {
        self.track(OperationKind::Delete, entity_type, entity_id, location_id, entity_name)
    }

    /// Coalescing upsert shared by the tracking operations.
    fn track(
        &self,
        event: OperationKind,
        entity_type: &str,
        entity_id: &str,
        location_id: &str,
        entity_name: Option<String>,
    ) -> LedgerResult<()> {
        if entity_type.trim().is_empty() {
            return Err(LedgerError::validation("entity_type must not be empty"));
        }
        if entity_id.trim().is_empty() {
            return Err(LedgerError::validation("entity_id must not be empty"));
        }
        if location_id.trim().is_empty() {
            return Err(LedgerError::validation("location_id must not be empty"));
        }

        let key = EntityKey::new(entity_type, entity_id);
        let _guard = self.write_lock.lock();

        let Some(mut live) = self.store.live_for_key(&key)? else {
            let record = ChangeRecord::new(
                event,
                entity_type,
                entity_id,
                location_id,
                entity_name,
            );
            self.store.insert(record)?;
            debug!(%key, ?event, "tracked new change");
            self.feed
                .emit(key, location_id, LedgerEventKind::Tracked(event));
            return Ok(());
        };

        match (live.operation, event) {
            // A pending delete is terminal until it syncs.
            (OperationKind::Delete, OperationKind::Create) => {
                return Err(LedgerError::DeletePending { key });
            }
            (OperationKind::Delete, _) => {
                debug!(%key, ?event, "ignored event on pending delete");
                return Ok(());
            }
            // The entity never left this device; nothing to sync.
            (OperationKind::Create, OperationKind::Delete) => {
                self.store.remove(live.id)?;
                debug!(%key, "create cancelled by delete");
                self.feed.emit(key, location_id, LedgerEventKind::Discarded);
                return Ok(());
            }
            (OperationKind::Update, OperationKind::Delete) => {
                live.operation = OperationKind::Delete;
                live.refresh(entity_name);
            }
            // Create swallows later updates; duplicate creates and
            // repeated updates just refresh the existing record.
            (OperationKind::Create, _) | (OperationKind::Update, _) => {
                live.refresh(entity_name);
            }
        }

        let resulting = live.operation;
        self.store.update(&live)?;
        debug!(%key, ?event, ?resulting, "coalesced change");
        self.feed
            .emit(key, location_id, LedgerEventKind::Coalesced(resulting));
        Ok(())
    }

    /// Returns the Pending or Failed record for an entity, if any.
    pub fn live_record(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> LedgerResult<Option<ChangeRecord>> {
        Ok(self
            .store
            .live_for_key(&EntityKey::new(entity_type, entity_id))?)
    }

    /// Returns all unsynced (Pending and Failed) records for a scope,
    /// oldest first, so causal push order is preserved.
    pub fn unsynced(&self, location_id: &str) -> LedgerResult<Vec<ChangeRecord>> {
        Ok(self.store.unsynced_for_location(location_id)?)
    }

    /// Returns the most recently synced records for a scope, newest
    /// first, bounded by `limit`. For observability only.
    pub fn synced(&self, location_id: &str, limit: usize) -> LedgerResult<Vec<ChangeRecord>> {
        Ok(self.store.synced_for_location(location_id, limit)?)
    }

    /// Marks a record as successfully pushed.
    ///
    /// Idempotent: marking an already-Synced record again is a no-op,
    /// and an unknown ID (the record may have been purged since the
    /// push batch was snapshotted) is logged and ignored.
    ///
    /// Marking a Delete record Synced also purges the key's older
    /// synced history: the deletion has durably reached the server, so
    /// the history can no longer be misread as live state.
    pub fn mark_synced(&self, id: RecordId) -> LedgerResult<()> {
        let _guard = self.write_lock.lock();

        let Some(mut record) = self.store.get(id)? else {
            warn!(%id, "mark_synced for unknown record; treating as already purged");
            return Ok(());
        };
        if record.status == SyncStatus::Synced {
            return Ok(());
        }

        let now = Utc::now();
        record.mark_synced(now);
        self.store.update(&record)?;
        self.advance_cursor(&record.location_id, now);

        if record.operation == OperationKind::Delete {
            let key = record.key();
            for old in self.store.synced_for_key(&key)? {
                if old.id != id {
                    self.store.remove(old.id)?;
                }
            }
        }

        debug!(key = %record.key(), %id, "record synced");
        self.feed
            .emit(record.key(), record.location_id.clone(), LedgerEventKind::Synced);
        Ok(())
    }

    /// Records a failed push attempt for a record.
    ///
    /// The record stays eligible for retry via [`ChangeLedger::unsynced`].
    /// An unknown ID is logged and ignored, as is a record that already
    /// reached the terminal Synced state.
    pub fn record_failure(&self, id: RecordId, message: &str) -> LedgerResult<()> {
        let _guard = self.write_lock.lock();

        let Some(mut record) = self.store.get(id)? else {
            warn!(%id, "record_failure for unknown record; treating as already purged");
            return Ok(());
        };
        if record.status == SyncStatus::Synced {
            warn!(%id, "record_failure for already-synced record; ignoring");
            return Ok(());
        }

        record.mark_failed(message);
        self.store.update(&record)?;

        debug!(
            key = %record.key(),
            %id,
            attempts = record.attempt_count,
            error = message,
            "push attempt failed"
        );
        self.feed
            .emit(record.key(), record.location_id.clone(), LedgerEventKind::Failed);
        Ok(())
    }

    /// Unconditionally deletes every record, in any status, for an
    /// entity that has been permanently destroyed.
    ///
    /// Returns the number of records removed.
    pub fn purge_entity(&self, entity_type: &str, entity_id: &str) -> LedgerResult<usize> {
        let key = EntityKey::new(entity_type, entity_id);
        let _guard = self.write_lock.lock();

        let location_id = match self.store.live_for_key(&key)? {
            Some(record) => Some(record.location_id),
            None => self
                .store
                .synced_for_key(&key)?
                .into_iter()
                .next()
                .map(|r| r.location_id),
        };

        let removed = self.store.remove_for_key(&key)?;
        if removed > 0 {
            debug!(%key, removed, "purged entity records");
            if let Some(location_id) = location_id {
                self.feed.emit(key, location_id, LedgerEventKind::Purged);
            }
        }
        Ok(removed)
    }

    /// Deletes Synced records older than `cutoff`.
    ///
    /// Pending and Failed records are never purged by age: unsynced
    /// work must either sync or be removed via
    /// [`ChangeLedger::purge_entity`]. Returns the number of records
    /// removed.
    pub fn purge_synced_older_than(&self, cutoff: DateTime<Utc>) -> LedgerResult<usize> {
        let _guard = self.write_lock.lock();
        let removed = self.store.remove_synced_before(cutoff)?;
        if removed > 0 {
            debug!(removed, %cutoff, "purged synced records by age");
        }
        Ok(removed)
    }

    /// Returns the delta-sync lower bound for a scope: the latest
    /// `synced_at` seen among its records, or `None` if nothing has
    /// ever synced.
    ///
    /// Monotonic non-decreasing across calls: a high-water mark is kept
    /// per scope so neither out-of-order acknowledgements, clock skew,
    /// nor purges of old history can move the cursor backward.
    pub fn sync_cursor(&self, location_id: &str) -> LedgerResult<Option<DateTime<Utc>>> {
        let stored = self.store.max_synced_at(location_id)?;
        let high_water = self.cursors.read().get(location_id).copied();
        Ok(match (stored, high_water) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        })
    }

    /// Raises a scope's cursor high-water mark; never lowers it.
    fn advance_cursor(&self, location_id: &str, at: DateTime<Utc>) {
        let mut cursors = self.cursors.write();
        let mark = cursors.entry(location_id.to_string()).or_insert(at);
        if *mark < at {
            *mark = at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ledger() -> ChangeLedger {
        ChangeLedger::in_memory()
    }

    fn track(ledger: &ChangeLedger, op: OperationKind, entity_id: &str) {
        match op {
            OperationKind::Create => ledger
                .track_create("Recipe", entity_id, "loc-1", Some("Stock".into()))
                .unwrap(),
            OperationKind::Update => ledger
                .track_update("Recipe", entity_id, "loc-1", None)
                .unwrap(),
            OperationKind::Delete => ledger
                .track_delete("Recipe", entity_id, "loc-1", None)
                .unwrap(),
        }
    }

    #[test]
    fn tracking_requires_key_fields() {
        let ledger = ledger();
        assert!(matches!(
            ledger.track_create("", "r-1", "loc-1", None),
            Err(LedgerError::Validation { .. })
        ));
        assert!(matches!(
            ledger.track_update("Recipe", " ", "loc-1", None),
            Err(LedgerError::Validation { .. })
        ));
        assert!(matches!(
            ledger.track_delete("Recipe", "r-1", "", None),
            Err(LedgerError::Validation { .. })
        ));
    }

    #[test]
    fn at_most_one_live_record_per_key() {
        let ledger = ledger();
        track(&ledger, OperationKind::Create, "r-1");
        track(&ledger, OperationKind::Update, "r-1");
        track(&ledger, OperationKind::Update, "r-1");

        let unsynced = ledger.unsynced("loc-1").unwrap();
        assert_eq!(unsynced.len(), 1);
        // Create swallows later updates.
        assert_eq!(unsynced[0].operation, OperationKind::Create);
    }

    #[test]
    fn create_then_delete_nets_to_zero() {
        let ledger = ledger();
        track(&ledger, OperationKind::Create, "r-1");
        track(&ledger, OperationKind::Delete, "r-1");

        assert!(ledger.unsynced("loc-1").unwrap().is_empty());
        assert!(ledger.live_record("Recipe", "r-1").unwrap().is_none());
    }

    #[test]
    fn update_then_delete_leaves_one_delete() {
        let ledger = ledger();
        track(&ledger, OperationKind::Update, "r-1");
        track(&ledger, OperationKind::Delete, "r-1");

        let unsynced = ledger.unsynced("loc-1").unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].operation, OperationKind::Delete);
    }

    #[test]
    fn pending_delete_is_terminal_and_rejects_resurrection() {
        let ledger = ledger();
        track(&ledger, OperationKind::Update, "r-1");
        track(&ledger, OperationKind::Delete, "r-1");

        assert!(matches!(
            ledger.track_create("Recipe", "r-1", "loc-1", None),
            Err(LedgerError::DeletePending { .. })
        ));

        // Updates and repeated deletes are swallowed.
        track(&ledger, OperationKind::Update, "r-1");
        track(&ledger, OperationKind::Delete, "r-1");
        let unsynced = ledger.unsynced("loc-1").unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].operation, OperationKind::Delete);
    }

    #[test]
    fn coalescing_refreshes_name() {
        let ledger = ledger();
        track(&ledger, OperationKind::Create, "r-1");
        ledger
            .track_update("Recipe", "r-1", "loc-1", Some("Brown stock".into()))
            .unwrap();

        let live = ledger.live_record("Recipe", "r-1").unwrap().unwrap();
        assert_eq!(live.entity_name.as_deref(), Some("Brown stock"));
    }

    #[test]
    fn mark_synced_is_idempotent() {
        let ledger = ledger();
        track(&ledger, OperationKind::Create, "r-1");
        let id = ledger.unsynced("loc-1").unwrap()[0].id;

        ledger.mark_synced(id).unwrap();
        let first = ledger.synced("loc-1", 10).unwrap()[0].synced_at;
        ledger.mark_synced(id).unwrap();
        let second = ledger.synced("loc-1", 10).unwrap()[0].synced_at;

        assert_eq!(first, second);
        assert!(ledger.unsynced("loc-1").unwrap().is_empty());
    }

    #[test]
    fn mark_synced_unknown_id_is_noop() {
        let ledger = ledger();
        ledger.mark_synced(RecordId::new()).unwrap();
        ledger.record_failure(RecordId::new(), "whatever").unwrap();
    }

    #[test]
    fn record_failure_keeps_record_retryable() {
        let ledger = ledger();
        track(&ledger, OperationKind::Update, "r-1");
        let id = ledger.unsynced("loc-1").unwrap()[0].id;

        ledger.record_failure(id, "409 Conflict").unwrap();
        let unsynced = ledger.unsynced("loc-1").unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].status, SyncStatus::Failed);
        assert_eq!(unsynced[0].last_error.as_deref(), Some("409 Conflict"));
        assert_eq!(unsynced[0].attempt_count, 1);

        // A later edit coalesces into the failed record.
        track(&ledger, OperationKind::Update, "r-1");
        let unsynced = ledger.unsynced("loc-1").unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].attempt_count, 1);
    }

    #[test]
    fn record_failure_never_regresses_synced() {
        let ledger = ledger();
        track(&ledger, OperationKind::Update, "r-1");
        let id = ledger.unsynced("loc-1").unwrap()[0].id;
        ledger.mark_synced(id).unwrap();

        ledger.record_failure(id, "late report").unwrap();
        assert!(ledger.unsynced("loc-1").unwrap().is_empty());
        assert_eq!(ledger.synced("loc-1", 10).unwrap().len(), 1);
    }

    #[test]
    fn sync_after_update_creates_new_history() {
        let ledger = ledger();
        track(&ledger, OperationKind::Create, "r-1");
        let id = ledger.unsynced("loc-1").unwrap()[0].id;
        ledger.mark_synced(id).unwrap();

        // Editing again after a successful sync opens a fresh record.
        track(&ledger, OperationKind::Update, "r-1");
        let unsynced = ledger.unsynced("loc-1").unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].operation, OperationKind::Update);
        assert_ne!(unsynced[0].id, id);

        ledger.mark_synced(unsynced[0].id).unwrap();
        assert_eq!(ledger.synced("loc-1", 10).unwrap().len(), 2);
    }

    #[test]
    fn synced_delete_purges_older_history() {
        let ledger = ledger();
        track(&ledger, OperationKind::Create, "r-1");
        let create_id = ledger.unsynced("loc-1").unwrap()[0].id;
        ledger.mark_synced(create_id).unwrap();

        track(&ledger, OperationKind::Delete, "r-1");
        let delete_id = ledger.unsynced("loc-1").unwrap()[0].id;
        ledger.mark_synced(delete_id).unwrap();

        let synced = ledger.synced("loc-1", 10).unwrap();
        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0].id, delete_id);
        assert_eq!(synced[0].operation, OperationKind::Delete);
    }

    #[test]
    fn purge_entity_spans_all_statuses() {
        let ledger = ledger();
        track(&ledger, OperationKind::Create, "r-1");
        let id = ledger.unsynced("loc-1").unwrap()[0].id;
        ledger.mark_synced(id).unwrap();
        track(&ledger, OperationKind::Update, "r-1");
        track(&ledger, OperationKind::Update, "r-2");

        let removed = ledger.purge_entity("Recipe", "r-1").unwrap();
        assert_eq!(removed, 2);
        assert!(ledger.synced("loc-1", 10).unwrap().is_empty());
        let unsynced = ledger.unsynced("loc-1").unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].entity_id, "r-2");
        assert_eq!(ledger.purge_entity("Recipe", "r-1").unwrap(), 0);
    }

    #[test]
    fn cursor_tracks_latest_sync() {
        let ledger = ledger();
        assert!(ledger.sync_cursor("loc-1").unwrap().is_none());

        track(&ledger, OperationKind::Create, "r-1");
        let id = ledger.unsynced("loc-1").unwrap()[0].id;
        ledger.mark_synced(id).unwrap();

        let cursor = ledger.sync_cursor("loc-1").unwrap().unwrap();
        let synced_at = ledger.synced("loc-1", 1).unwrap()[0].synced_at.unwrap();
        assert_eq!(cursor, synced_at);
    }

    #[test]
    fn cursor_survives_purge_of_history() {
        let ledger = ledger();
        track(&ledger, OperationKind::Create, "r-1");
        let id = ledger.unsynced("loc-1").unwrap()[0].id;
        ledger.mark_synced(id).unwrap();
        let before = ledger.sync_cursor("loc-1").unwrap();

        ledger
            .purge_synced_older_than(Utc::now() + Duration::days(1))
            .unwrap();
        assert!(ledger.synced("loc-1", 10).unwrap().is_empty());
        assert_eq!(ledger.sync_cursor("loc-1").unwrap(), before);
    }

    #[test]
    fn cursors_are_scoped_per_location() {
        let ledger = ledger();
        track(&ledger, OperationKind::Create, "r-1");
        let id = ledger.unsynced("loc-1").unwrap()[0].id;
        ledger.mark_synced(id).unwrap();

        assert!(ledger.sync_cursor("loc-1").unwrap().is_some());
        assert!(ledger.sync_cursor("loc-2").unwrap().is_none());
    }

    #[test]
    fn feed_events_follow_mutations() {
        let ledger = ledger();
        let rx = ledger.subscribe();

        track(&ledger, OperationKind::Create, "r-1");
        track(&ledger, OperationKind::Update, "r-1");
        track(&ledger, OperationKind::Delete, "r-1");

        let kinds: Vec<LedgerEventKind> = rx.try_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LedgerEventKind::Tracked(OperationKind::Create),
                LedgerEventKind::Coalesced(OperationKind::Create),
                LedgerEventKind::Discarded,
            ]
        );
    }
}
