//! Test fixtures for pipeline testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::store::{Store, Value, WriteMode};

/// A store builder for seeding runs.
#[derive(Debug, Default)]
pub struct TestStore {
    entries: Vec<(String, Value)>,
    diagnostics: bool,
    strict_missing_key: bool,
}

impl TestStore {
    /// Creates an empty test store builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    /// Enables diagnostics.
    #[must_use]
    pub const fn with_diagnostics(mut self) -> Self {
        self.diagnostics = true;
        self
    }

    /// Enables strict missing-key reads.
    #[must_use]
    pub const fn with_strict_missing_key(mut self) -> Self {
        self.strict_missing_key = true;
        self
    }

    /// Builds the store.
    #[must_use]
    pub fn build(self) -> Store {
        let store = Store::new();
        if self.diagnostics {
            store.set_diagnostics(true);
        }
        if self.strict_missing_key {
            store.set_strict_on_missing_key(true);
        }
        for (key, value) in self.entries {
            store.set(key, value, WriteMode::Overwrite);
        }
        store
    }
}

/// A shared counter for observing side effects.
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    count: Arc<AtomicUsize>,
}

impl CallCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter and returns the new count.
    pub fn hit(&self) -> usize {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the current count.
    #[must_use]
    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}
