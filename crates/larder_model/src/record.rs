//! Change records tracked by the modification ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a change record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generates a fresh random record ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The coalescing key: one business entity within one entity kind.
///
/// For a given key, at most one record is Pending or Failed at any time.
/// Multiple Synced records for the same key may coexist as sync history
/// until purged by age.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Kind of business entity (e.g. "Recipe").
    pub entity_type: String,
    /// Unique identifier of the affected entity.
    pub entity_id: String,
}

impl EntityKey {
    /// Creates a key from an entity type and entity ID.
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}

/// Kind of local mutation a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Entity was created locally and has never been pushed.
    Create,
    /// Entity existed remotely and was edited locally.
    Update,
    /// Entity was deleted locally.
    Delete,
}

/// Sync lifecycle state of a change record.
///
/// Transitions: `Pending --push ok--> Synced` (terminal, purge-eligible
/// by age); `Pending --push fail--> Failed`; `Failed --retry--> Pending
/// or Failed`; any state is removed immediately by an entity purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Waiting to be pushed.
    Pending,
    /// Last push attempt failed; still eligible for retry.
    Failed,
    /// Successfully pushed.
    Synced,
}

impl SyncStatus {
    /// Returns true if the record still has work outstanding.
    #[must_use]
    pub fn is_unsynced(&self) -> bool {
        matches!(self, SyncStatus::Pending | SyncStatus::Failed)
    }
}

/// One tracked mutation state for a business entity.
///
/// A record is created by the first local mutation of an entity after its
/// last successful sync. Further local mutations coalesce into the same
/// record until a push succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Unique identifier of this record.
    pub id: RecordId,
    /// Kind of business entity (e.g. "Recipe").
    pub entity_type: String,
    /// Unique identifier of the affected entity.
    pub entity_id: String,
    /// Tenant/location scope the entity belongs to.
    pub location_id: String,
    /// Optional display label, refreshed on coalescing.
    pub entity_name: Option<String>,
    /// Kind of mutation this record currently represents.
    pub operation: OperationKind,
    /// Time the record, or its current coalesced form, was established.
    pub created_at: DateTime<Utc>,
    /// Time of successful push, if any.
    pub synced_at: Option<DateTime<Utc>>,
    /// Current sync lifecycle state.
    pub status: SyncStatus,
    /// Message from the last failed push attempt.
    pub last_error: Option<String>,
    /// Number of failed push attempts so far.
    pub attempt_count: u32,
}

impl ChangeRecord {
    /// Creates a new Pending record for a local mutation.
    pub fn new(
        operation: OperationKind,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        location_id: impl Into<String>,
        entity_name: Option<String>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            location_id: location_id.into(),
            entity_name,
            operation,
            created_at: Utc::now(),
            synced_at: None,
            status: SyncStatus::Pending,
            last_error: None,
            attempt_count: 0,
        }
    }

    /// Returns the coalescing key for this record.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_type.clone(), self.entity_id.clone())
    }

    /// Refreshes the display name and establishment time.
    ///
    /// Called when a later local mutation coalesces into this record.
    /// A `None` name keeps the previously captured one.
    pub fn refresh(&mut self, entity_name: Option<String>) {
        if entity_name.is_some() {
            self.entity_name = entity_name;
        }
        self.created_at = Utc::now();
    }

    /// Marks this record as successfully pushed at the given time.
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.status = SyncStatus::Synced;
        self.synced_at = Some(at);
        self.last_error = None;
    }

    /// Records a failed push attempt.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = SyncStatus::Failed;
        self.last_error = Some(message.into());
        self.attempt_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(operation: OperationKind) -> ChangeRecord {
        ChangeRecord::new(operation, "Recipe", "r-1", "loc-1", Some("Stock".into()))
    }

    #[test]
    fn new_record_is_pending() {
        let rec = record(OperationKind::Create);
        assert_eq!(rec.status, SyncStatus::Pending);
        assert_eq!(rec.synced_at, None);
        assert_eq!(rec.attempt_count, 0);
        assert!(rec.status.is_unsynced());
    }

    #[test]
    fn mark_synced_sets_terminal_state() {
        let mut rec = record(OperationKind::Update);
        rec.mark_failed("timeout");
        let now = Utc::now();
        rec.mark_synced(now);

        assert_eq!(rec.status, SyncStatus::Synced);
        assert_eq!(rec.synced_at, Some(now));
        assert_eq!(rec.last_error, None);
        assert!(!rec.status.is_unsynced());
    }

    #[test]
    fn mark_failed_accumulates_attempts() {
        let mut rec = record(OperationKind::Update);
        rec.mark_failed("409 Conflict");
        rec.mark_failed("timeout");

        assert_eq!(rec.status, SyncStatus::Failed);
        assert_eq!(rec.attempt_count, 2);
        assert_eq!(rec.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn refresh_keeps_name_when_absent() {
        let mut rec = record(OperationKind::Update);
        rec.refresh(None);
        assert_eq!(rec.entity_name.as_deref(), Some("Stock"));

        rec.refresh(Some("Brown stock".into()));
        assert_eq!(rec.entity_name.as_deref(), Some("Brown stock"));
    }

    #[test]
    fn key_display() {
        let rec = record(OperationKind::Create);
        assert_eq!(rec.key().to_string(), "Recipe/r-1");
    }

    #[test]
    fn record_ids_are_unique() {
        assert_ne!(RecordId::new(), RecordId::new());
    }
}
