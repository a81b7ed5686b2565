//! Test fixture utilities.

use crate::memory::{FaultPlan, MemManager, MemStore};

/// A manager with handles to its store and fault plan, the common test setup.
#[derive(Debug, Default)]
pub struct TestBackend {
    /// Connection provider to hand to a pool.
    pub manager: MemManager,
    /// The store behind the manager.
    pub store: MemStore,
    /// Fault plan consulted by the manager's connections.
    pub faults: FaultPlan,
}

impl TestBackend {
    /// Create a backend over an empty store.
    #[must_use]
    pub fn new() -> Self {
        let store = MemStore::new();
        let faults = FaultPlan::new();
        Self {
            manager: MemManager::with_faults(store.clone(), faults.clone()),
            store,
            faults,
        }
    }

    /// Create a backend whose store is pre-seeded with committed rows.
    #[must_use]
    pub fn seeded(tables: &[(&str, &[&str])]) -> Self {
        let backend = Self::new();
        for (table, values) in tables {
            for value in *values {
                backend.store.insert_committed(table, value);
            }
        }
        backend
    }
}
