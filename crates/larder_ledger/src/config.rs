//! Configuration for retention sweeps.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Configuration for the retention janitor.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// How long Synced records are kept as history before age-purge.
    pub synced_max_age: Duration,
}

impl RetentionConfig {
    /// Creates a configuration with the given history age.
    #[must_use]
    pub fn new(synced_max_age: Duration) -> Self {
        Self { synced_max_age }
    }

    /// Sets the history age.
    #[must_use]
    pub fn with_synced_max_age(mut self, age: Duration) -> Self {
        self.synced_max_age = age;
        self
    }

    /// Returns the purge cutoff for a sweep starting at `now`.
    ///
    /// Saturates at the representable minimum instead of wrapping when
    /// the configured age exceeds the timeline.
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match chrono::Duration::from_std(self.synced_max_age) {
            Ok(age) => now
                .checked_sub_signed(age)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            Err(_) => DateTime::<Utc>::MIN_UTC,
        }
    }
}

impl Default for RetentionConfig {
    /// Thirty days of sync history.
    fn default() -> Self {
        Self::new(Duration::from_secs(30 * 24 * 60 * 60))
    }
}
