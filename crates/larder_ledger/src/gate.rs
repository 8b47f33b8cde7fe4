//! Optimistic concurrency detection.
//!
//! The gate is a stateless comparator invoked immediately before
//! committing a local update: the version token captured when the
//! entity was loaded for editing is compared against the token
//! currently persisted. Detection is advisory and never blocks readers.

use larder_model::{Syncable, VersionToken};

/// Returns true iff both tokens are present and byte-wise unequal.
///
/// An absent token means the conflict cannot be detected; the gate
/// answers false rather than risking a false positive.
#[must_use]
pub fn has_conflict(loaded: Option<&VersionToken>, current: Option<&VersionToken>) -> bool {
    match (loaded, current) {
        (Some(loaded), Some(current)) => loaded != current,
        _ => false,
    }
}

/// Compares the tokens of a loaded entity and its persisted state.
#[must_use]
pub fn entity_has_conflict<E: Syncable>(loaded: &E, persisted: &E) -> bool {
    has_conflict(loaded.version_token(), persisted.version_token())
}
