//! # Larder Model
//!
//! Shared data model for the Larder sync core.
//!
//! This crate provides:
//! - [`ChangeRecord`] and its lifecycle enums for the modification ledger
//! - [`VersionToken`] for optimistic concurrency detection
//! - The [`Syncable`] contract every syncable business entity exposes
//! - [`Resolution`] types for conflict settlement
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod record;
mod resolution;

pub use entity::{Syncable, VersionToken};
pub use record::{ChangeRecord, EntityKey, OperationKind, RecordId, SyncStatus};
pub use resolution::{Resolution, ResolutionStrategy};
