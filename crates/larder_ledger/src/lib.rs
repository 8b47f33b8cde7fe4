//! # Larder Ledger
//!
//! Change tracking and conflict resolution core for Larder.
//!
//! This crate provides:
//! - [`ChangeLedger`] - coalescing log of unsynced mutations per entity
//! - [`gate`] - stateless optimistic-concurrency detection
//! - [`ConflictResolver`] - keep-mine / keep-theirs / merge / cancel
//! - [`RetentionJanitor`] - history age-purge and hard-delete cleanup
//! - [`PushRunner`] - batch push driver over the transport contract
//! - [`LedgerFeed`] - ordered change notifications
//!
//! ## Architecture
//!
//! The editing layer calls the ledger on every create/update/delete of
//! a syncable entity. A background sync engine snapshots
//! [`ChangeLedger::unsynced`] to build a push batch and reports
//! per-record outcomes back through [`ChangeLedger::mark_synced`] and
//! [`ChangeLedger::record_failure`]. On a version-mismatch rejection it
//! consults the gate and resolver, then retries with the resolved
//! entity or leaves the record Failed pending a decision.
//!
//! ## Key Invariants
//!
//! - At most one Pending/Failed record per (entity type, entity id)
//! - Push batches preserve causal order (oldest first)
//! - `mark_synced` is idempotent; outcomes apply per record
//! - The sync cursor never moves backward for a scope
//! - Conflicts are surfaced, never silently overwritten

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod feed;
pub mod gate;
mod janitor;
mod ledger;
mod push;
mod resolve;

pub use config::RetentionConfig;
pub use error::{LedgerError, LedgerResult};
pub use feed::{LedgerEvent, LedgerEventKind, LedgerFeed};
pub use janitor::{PurgeStats, RetentionJanitor};
pub use ledger::ChangeLedger;
pub use push::{MockTransport, PushCycleResult, PushOutcome, PushRunner, PushTransport};
pub use resolve::{ConflictHandler, ConflictResolver, DeferAll, MergeFn};
