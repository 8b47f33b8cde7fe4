//! Error types for the ledger core.

use larder_model::{EntityKey, ResolutionStrategy};
use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A tracking call was missing a required field.
    #[error("validation failed: {message}")]
    Validation {
        /// What was missing or malformed.
        message: String,
    },

    /// A delete is already pending for this key; the same entity ID
    /// cannot be resurrected until the delete has synced.
    #[error("delete pending for {key}: cannot track a create for the same id")]
    DeletePending {
        /// The coalescing key with the pending delete.
        key: EntityKey,
    },

    /// The requested strategy needs a capability the caller did not
    /// supply.
    #[error("strategy {strategy:?} requires a caller-supplied merge function")]
    UnsupportedStrategy {
        /// The strategy that could not be applied.
        strategy: ResolutionStrategy,
    },

    /// No resolution decision was made; the conflicting record stays
    /// unsynced and nothing is overwritten.
    #[error("conflict on entity {entity_id} was left unresolved")]
    ConflictUnresolved {
        /// The entity whose conflict was deferred.
        entity_id: String,
    },

    /// Record store error.
    #[error("store error: {0}")]
    Store(#[from] larder_store::StoreError),
}

impl LedgerError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
