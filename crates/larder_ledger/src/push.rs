//! Batch push driver over a ledger snapshot.
//!
//! The runner owns no network I/O and no timeout policy: it hands each
//! unsynced record to a [`PushTransport`] collaborator and applies the
//! reported outcome to the ledger immediately, one record at a time.
//! A crash or cancellation mid-batch therefore leaves every record in a
//! valid, resumable state.

use crate::error::LedgerResult;
use crate::ledger::ChangeLedger;
use larder_model::{ChangeRecord, RecordId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Outcome of pushing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The server accepted the entity.
    Accepted,
    /// The server rejected the entity; the reason is stored on the
    /// record as its last error.
    ///
    /// A version-mismatch rejection is settled by the caller through
    /// the gate and resolver before the next cycle retries the record.
    Rejected(String),
}

/// The sync transport collaborator contract.
///
/// Implementations map their own transport failures to
/// [`PushOutcome::Rejected`]; the runner treats every outcome as final
/// for this cycle.
pub trait PushTransport: Send + Sync {
    /// Attempts to push one record's entity to the server.
    fn push(&self, record: &ChangeRecord) -> PushOutcome;
}

/// Result of one push cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PushCycleResult {
    /// Number of records marked Synced.
    pub pushed: usize,
    /// Number of records marked Failed.
    pub failed: usize,
    /// True if the cycle stopped early due to cancellation.
    pub cancelled: bool,
}

/// Drives push cycles for one ledger.
pub struct PushRunner<T: PushTransport> {
    ledger: Arc<ChangeLedger>,
    transport: Arc<T>,
    cancelled: AtomicBool,
}

impl<T: PushTransport> PushRunner<T> {
    /// Creates a runner over the given ledger and transport.
    pub fn new(ledger: Arc<ChangeLedger>, transport: T) -> Self {
        Self {
            ledger,
            transport: Arc::new(transport),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Returns the transport, e.g. to script a mock in tests.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Requests cancellation of an in-flight cycle.
    ///
    /// The record currently being pushed still gets its outcome
    /// applied; the rest of the batch is left untouched. The runner
    /// stays cancelled until [`PushRunner::reset_cancel`] is called.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clears the cancelled flag so the next cycle can run.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Pushes every unsynced record for a scope, oldest first.
    ///
    /// Each record's outcome is applied to the ledger before the next
    /// record is attempted, so partial cycles are resumable and retries
    /// are idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error only if the ledger itself fails; transport
    /// rejections are recorded per record, not raised.
    pub fn run(&self, location_id: &str) -> LedgerResult<PushCycleResult> {
        let batch = self.ledger.unsynced(location_id)?;
        debug!(location_id, batch = batch.len(), "starting push cycle");

        let mut result = PushCycleResult::default();
        for record in batch {
            if self.cancelled.load(Ordering::SeqCst) {
                result.cancelled = true;
                break;
            }

            match self.transport.push(&record) {
                PushOutcome::Accepted => {
                    self.ledger.mark_synced(record.id)?;
                    result.pushed += 1;
                }
                PushOutcome::Rejected(reason) => {
                    self.ledger.record_failure(record.id, &reason)?;
                    result.failed += 1;
                }
            }
        }

        debug!(
            location_id,
            pushed = result.pushed,
            failed = result.failed,
            cancelled = result.cancelled,
            "push cycle finished"
        );
        Ok(result)
    }
}

/// A scriptable transport for tests.
///
/// Outcomes are consumed in FIFO order; when the script runs out, every
/// push is accepted. All pushed record IDs are retained for inspection.
#[derive(Default)]
pub struct MockTransport {
    outcomes: Mutex<VecDeque<PushOutcome>>,
    pushed: Mutex<Vec<RecordId>>,
}

impl MockTransport {
    /// Creates a transport that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome for the next unscripted push.
    pub fn enqueue(&self, outcome: PushOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Returns the IDs of every record pushed so far, in order.
    pub fn pushed(&self) -> Vec<RecordId> {
        self.pushed.lock().clone()
    }
}

impl PushTransport for MockTransport {
    fn push(&self, record: &ChangeRecord) -> PushOutcome {
        self.pushed.lock().push(record.id);
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or(PushOutcome::Accepted)
    }
}
