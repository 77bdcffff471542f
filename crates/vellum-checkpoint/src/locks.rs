use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vellum_types::FileKey;

/// One mutex per document, created on first use.
///
/// Operations on the same [`FileKey`] run one at a time; different keys
/// never contend beyond the brief map lookup.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<FileKey, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_key<T>(&self, key: &FileKey, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.locks.lock().expect("keyed lock map poisoned");
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        let _guard = lock.lock().expect("document lock poisoned");
        f()
    }

    /// Number of keys that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.lock().expect("keyed lock map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
