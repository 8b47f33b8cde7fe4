//! Scripted harness that applies operations and checks invariants.

use crate::fixtures::{TestLedger, TEST_LOCATION};
use crate::generators::{entity_id, LedgerOp};
use chrono::{DateTime, Utc};
use larder_ledger::LedgerError;
use larder_model::OperationKind;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Applies [`LedgerOp`] scripts to a ledger and verifies the core
/// invariants after every step.
pub struct LedgerHarness {
    /// The fixture under test.
    pub fixture: TestLedger,
    last_cursor: Mutex<Option<DateTime<Utc>>>,
}

impl LedgerHarness {
    /// Creates a harness over an in-memory ledger.
    #[must_use]
    pub fn memory() -> Self {
        Self::over(TestLedger::memory())
    }

    /// Creates a harness over a file-backed ledger.
    #[must_use]
    pub fn file() -> Self {
        Self::over(TestLedger::file())
    }

    /// Creates a harness over an existing fixture.
    #[must_use]
    pub fn over(fixture: TestLedger) -> Self {
        Self {
            fixture,
            last_cursor: Mutex::new(None),
        }
    }

    /// Applies one scripted step.
    ///
    /// A rejected resurrection (`DeletePending`) is an expected outcome
    /// of random scripts and is swallowed; any other error panics.
    pub fn apply(&self, op: &LedgerOp) {
        match op {
            LedgerOp::Track(kind, index) => {
                let id = entity_id(*index);
                let result = match kind {
                    OperationKind::Create => {
                        self.fixture
                            .track_create("Recipe", &id, TEST_LOCATION, None)
                    }
                    OperationKind::Update => {
                        self.fixture
                            .track_update("Recipe", &id, TEST_LOCATION, None)
                    }
                    OperationKind::Delete => {
                        self.fixture
                            .track_delete("Recipe", &id, TEST_LOCATION, None)
                    }
                };
                match result {
                    Ok(()) | Err(LedgerError::DeletePending { .. }) => {}
                    Err(other) => panic!("unexpected tracking error: {other}"),
                }
            }
            LedgerOp::SyncOldest => {
                let batch = self.fixture.unsynced(TEST_LOCATION).expect("unsynced");
                if let Some(first) = batch.first() {
                    self.fixture.mark_synced(first.id).expect("mark_synced");
                }
            }
            LedgerOp::FailOldest => {
                let batch = self.fixture.unsynced(TEST_LOCATION).expect("unsynced");
                if let Some(first) = batch.first() {
                    self.fixture
                        .record_failure(first.id, "injected failure")
                        .expect("record_failure");
                }
            }
            LedgerOp::PurgeEntity(index) => {
                self.fixture
                    .purge_entity("Recipe", &entity_id(*index))
                    .expect("purge_entity");
            }
        }
    }

    /// Asserts the core ledger invariants.
    ///
    /// - At most one unsynced record per coalescing key
    /// - `unsynced` only returns Pending/Failed records, oldest first
    /// - The sync cursor never moves backward
    pub fn assert_invariants(&self) {
        let unsynced = self.fixture.unsynced(TEST_LOCATION).expect("unsynced");

        let mut seen = HashSet::new();
        for record in &unsynced {
            assert!(
                record.status.is_unsynced(),
                "unsynced returned a {:?} record",
                record.status
            );
            assert!(
                seen.insert(record.key()),
                "more than one live record for {}",
                record.key()
            );
        }
        for pair in unsynced.windows(2) {
            assert!(
                pair[0].created_at <= pair[1].created_at,
                "push order is not oldest-first"
            );
        }

        let cursor = self.fixture.sync_cursor(TEST_LOCATION).expect("cursor");
        let mut last = self.last_cursor.lock();
        if let (Some(previous), Some(current)) = (*last, cursor) {
            assert!(
                current >= previous,
                "sync cursor moved backward: {previous} -> {current}"
            );
        }
        if cursor.is_some() {
            *last = cursor;
        }
    }
}
