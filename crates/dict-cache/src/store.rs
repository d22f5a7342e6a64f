//! Cache store: the current [`DictionaryTable`] behind an atomically
//! swappable handle.
//!
//! Readers load the current snapshot without taking a lock; a refresh builds
//! its table elsewhere and publishes it with a single [`CacheStore::swap`].
//! Readers that already hold a snapshot keep using it until they drop it.

use crate::{DictionaryTable, FieldRecord};
use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub keys: Vec<String>,
    pub duplicates: usize,
}

#[derive(Default)]
pub struct CacheStore {
    current: ArcSwapOption<DictionaryTable>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point lookup against the currently visible table.
    pub fn lookup(&self, longname: &str) -> Option<FieldRecord> {
        match &*self.current.load() {
            Some(table) => table.get(longname).cloned(),
            None => None,
        }
    }

    /// Pin the current table. `None` until the first successful swap.
    pub fn snapshot(&self) -> Option<Arc<DictionaryTable>> {
        self.current.load_full()
    }

    pub fn is_initialized(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn len(&self) -> usize {
        match &*self.current.load() {
            Some(table) => table.len(),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        match self.current.load_full() {
            Some(table) => CacheStats {
                total: table.len(),
                keys: table.keys(),
                duplicates: table.duplicates(),
            },
            None => CacheStats {
                total: 0,
                keys: Vec::new(),
                duplicates: 0,
            },
        }
    }

    /// Publish `table` as current. Returns the size of the replaced table.
    pub fn swap(&self, table: DictionaryTable) -> usize {
        let previous = self.current.swap(Some(Arc::new(table)));
        previous.map_or(0, |table| table.len())
    }
}
