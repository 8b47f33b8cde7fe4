//! # Larder Store
//!
//! Change record store trait and implementations for the Larder sync core.
//!
//! This crate provides the persistence abstraction for
//! [`ChangeRecord`](larder_model::ChangeRecord)s. The ledger owns all
//! coalescing and lifecycle rules; stores only answer the queries the
//! ledger needs.
//!
//! ## Available stores
//!
//! - [`MemoryStore`] - For testing and ephemeral ledgers
//! - [`FileStore`] - Persistent storage as an append-only CBOR oplog
//!
//! ## Example
//!
//! ```rust
//! use larder_model::{ChangeRecord, OperationKind};
//! use larder_store::{MemoryStore, RecordStore};
//!
//! let store = MemoryStore::new();
//! let record = ChangeRecord::new(OperationKind::Create, "Recipe", "r-1", "loc-1", None);
//! store.insert(record.clone()).unwrap();
//! assert_eq!(store.get(record.id).unwrap(), Some(record));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::RecordStore;
