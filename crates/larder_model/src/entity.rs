//! The contract syncable business entities expose to the sync core.

use serde::{Deserialize, Serialize};

/// Opaque optimistic-concurrency marker.
///
/// Every syncable entity carries a token maintained by its own
/// persistence layer; the token changes on every successful persisted
/// write. The sync core only ever compares tokens for byte-wise
/// equality and never interprets their contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken(String);

impl VersionToken {
    /// Creates a token from an opaque value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VersionToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VersionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Structural contract the ledger and conflict machinery operate through.
///
/// The sync core never touches concrete entity types; any entity that
/// exposes an ID, a location scope, an optional display name, and a
/// version token can be tracked and resolved.
pub trait Syncable {
    /// Unique identifier of the entity.
    fn entity_id(&self) -> &str;

    /// Tenant/location scope the entity belongs to.
    fn location_id(&self) -> &str;

    /// Optional display label for observability.
    fn display_name(&self) -> Option<&str> {
        None
    }

    /// Version token captured at the entity's last persisted write.
    ///
    /// `None` means the entity has never been persisted (or the store
    /// does not maintain tokens), in which case conflicts cannot be
    /// detected for it.
    fn version_token(&self) -> Option<&VersionToken>;

    /// Replaces the version token.
    ///
    /// Used by conflict resolution to adopt the persisted token so the
    /// next optimistic check succeeds.
    fn set_version_token(&mut self, token: Option<VersionToken>);
}
