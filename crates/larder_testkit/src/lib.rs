//! # Larder Testkit
//!
//! Test utilities for the Larder sync core.
//!
//! This crate provides:
//! - Ledger fixtures over memory and file stores
//! - Property-based test generators using proptest
//! - A scripted harness that checks ledger invariants step by step
//!
//! ## Usage
//!
//! ```rust
//! use larder_testkit::prelude::*;
//!
//! let harness = LedgerHarness::memory();
//! harness.apply(&LedgerOp::Track(larder_model::OperationKind::Create, 0));
//! harness.assert_invariants();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
