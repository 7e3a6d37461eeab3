//! Per-key mutual exclusion for `get_or_compute`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Table of per-key locks.
///
/// Callers working on the same key run one at a time; callers on different
/// keys only touch the table briefly to fetch their lock. Entries are removed
/// once the last holder releases them.
#[derive(Debug, Default)]
pub struct KeyLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_key<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let key_lock = lock(&self.table).entry(key.to_string()).or_default().clone();

        let result = {
            let _guard = lock(&key_lock);
            f()
        };

        let mut table = lock(&self.table);
        drop(key_lock);
        if table.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            table.remove(key);
        }
        result
    }

    /// Number of keys currently locked or waited on.
    pub fn active(&self) -> usize {
        lock(&self.table).len()
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
