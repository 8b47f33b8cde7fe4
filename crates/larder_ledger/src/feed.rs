//! Change notification feed for ledger mutations.
//!
//! The feed emits an event for every ledger state change, enabling:
//! - Sync scheduling (wake the push loop when work appears)
//! - Reactive UI badges ("3 changes waiting to sync")
//! - Audit logging
//!
//! Ordering is deterministic: the ledger mutates its store first, then
//! emits, so a subscriber that reads the ledger on receipt always sees
//! a state at least as new as the event.

use larder_model::{EntityKey, OperationKind};
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// What happened to a ledger key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEventKind {
    /// A new unsynced record was created for the key.
    Tracked(OperationKind),
    /// A mutation coalesced into the key's existing record; carries the
    /// resulting operation kind.
    Coalesced(OperationKind),
    /// A create followed by a delete cancelled out; the key has no
    /// record left.
    Discarded,
    /// The key's record was successfully pushed.
    Synced,
    /// A push attempt for the key's record failed.
    Failed,
    /// Every record for the key was removed.
    Purged,
}

/// A single event from the ledger feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEvent {
    /// Strictly increasing per-feed sequence number.
    pub sequence: u64,
    /// The affected coalescing key.
    pub key: EntityKey,
    /// Location scope of the affected entity.
    pub location_id: String,
    /// What happened.
    pub kind: LedgerEventKind,
}

/// Distributes ledger events to subscribers.
///
/// The feed:
/// - Assigns strictly increasing sequence numbers
/// - Preserves mutation order
/// - Supports multiple subscribers
/// - Keeps a bounded history for poll-based catch-up
pub struct LedgerFeed {
    subscribers: RwLock<Vec<Sender<LedgerEvent>>>,
    history: RwLock<Vec<LedgerEvent>>,
    next_sequence: RwLock<u64>,
    max_history: usize,
}

impl LedgerFeed {
    /// Creates a new feed with the default history bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_history(1024)
    }

    /// Creates a feed with a specific history bound.
    #[must_use]
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            next_sequence: RwLock::new(1),
            max_history,
        }
    }

    /// Subscribes to the feed.
    ///
    /// Returns a receiver that observes all future events. The receiver
    /// should be drained regularly to avoid unbounded channel growth.
    pub fn subscribe(&self) -> Receiver<LedgerEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all subscribers and returns its sequence.
    ///
    /// Called by the ledger after the store mutation has committed.
    pub(crate) fn emit(
        &self,
        key: EntityKey,
        location_id: impl Into<String>,
        kind: LedgerEventKind,
    ) -> u64 {
        let event = {
            // Sequence assignment and history append share one lock so
            // observed order matches sequence order.
            let mut history = self.history.write();
            let mut next = self.next_sequence.write();
            let event = LedgerEvent {
                sequence: *next,
                key,
                location_id: location_id.into(),
                kind,
            };
            *next += 1;
            history.push(event.clone());
            if history.len() > self.max_history {
                let excess = history.len() - self.max_history;
                history.drain(0..excess);
            }
            event
        };

        let sequence = event.sequence;
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        sequence
    }

    /// Returns events with `sequence > cursor`, up to `limit`.
    ///
    /// Useful for catch-up after a subscriber was offline, within the
    /// history bound.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<LedgerEvent> {
        self.history
            .read()
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest sequence number emitted, or 0 if none.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().last().map_or(0, |e| e.sequence)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for LedgerFeed {
    fn default() -> Self {
        Self::new()
    }
}
