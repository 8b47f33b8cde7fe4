//! Retention sweeps over ledger history.

use crate::config::RetentionConfig;
use crate::error::LedgerResult;
use crate::ledger::ChangeLedger;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Summary of one retention sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeStats {
    /// Number of Synced records removed by age.
    pub purged: usize,
    /// The cutoff the sweep used.
    pub cutoff: DateTime<Utc>,
}

/// Purges stale sync history and the records of destroyed entities.
///
/// The janitor owns no timer; the application runs it on whatever
/// schedule it chooses, or on demand. Unsynced work is never touched by
/// age — it must either sync or be purged with the entity itself.
pub struct RetentionJanitor {
    ledger: Arc<ChangeLedger>,
    config: RetentionConfig,
}

impl RetentionJanitor {
    /// Creates a janitor over the given ledger.
    pub fn new(ledger: Arc<ChangeLedger>, config: RetentionConfig) -> Self {
        Self { ledger, config }
    }

    /// Age-purges Synced records older than the configured history age.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    pub fn run(&self) -> LedgerResult<PurgeStats> {
        let cutoff = self.config.cutoff(Utc::now());
        let purged = self.ledger.purge_synced_older_than(cutoff)?;
        info!(purged, %cutoff, "retention sweep complete");
        Ok(PurgeStats { purged, cutoff })
    }

    /// Removes every record for an entity that has been permanently
    /// destroyed, in any status, immediately.
    ///
    /// Call this for hard deletes only; a soft/recoverable delete is an
    /// ordinary tracked mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    pub fn entity_destroyed(&self, entity_type: &str, entity_id: &str) -> LedgerResult<usize> {
        self.ledger.purge_entity(entity_type, entity_id)
    }
}
