//! Ledger fixtures with automatic cleanup.

use larder_ledger::ChangeLedger;
use larder_store::FileStore;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// The location scope used by all fixtures.
pub const TEST_LOCATION: &str = "loc-test";

/// A ledger over a disposable store.
pub struct TestLedger {
    /// The ledger under test.
    pub ledger: Arc<ChangeLedger>,
    path: Option<PathBuf>,
    /// Kept alive so the store file is not deleted mid-test.
    _temp_dir: Option<TempDir>,
}

impl TestLedger {
    /// Creates a ledger over an in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            ledger: Arc::new(ChangeLedger::in_memory()),
            path: None,
            _temp_dir: None,
        }
    }

    /// Creates a ledger over a file store in a temp directory.
    #[must_use]
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("ledger.log");
        let store = FileStore::open(&path).expect("failed to open file store");
        Self {
            ledger: Arc::new(ChangeLedger::new(Arc::new(store))),
            path: Some(path),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the oplog path if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// Reopens the oplog as a fresh store, as a restarted process would.
    ///
    /// # Panics
    ///
    /// Panics if the fixture is not file-backed.
    #[must_use]
    pub fn reopen_store(&self) -> FileStore {
        let path = self.path.as_ref().expect("fixture is not file-backed");
        FileStore::open(path).expect("failed to reopen file store")
    }
}

impl std::ops::Deref for TestLedger {
    type Target = ChangeLedger;

    fn deref(&self) -> &Self::Target {
        &self.ledger
    }
}
