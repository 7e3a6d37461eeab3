//! In-process string cache.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use super::locks::{KeyLocks, lock};
use super::{Error, StringCacher};

/// In-memory cache, unbounded or bounded with least-recently-used eviction.
///
/// Only the bounded cache tracks recency. An unbounded cache never evicts, so
/// its reads leave the entry order alone.
pub struct InMemoryCacher {
    max_size: Option<usize>,
    entries: Mutex<LruCache<String, String>>,
    locks: KeyLocks,
}

impl InMemoryCacher {
    /// `None` never evicts. `Some(n)` holds at most `n` entries.
    pub fn new(max_size: Option<usize>) -> Self {
        let entries = match max_size.and_then(NonZeroUsize::new) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self { max_size, entries: Mutex::new(entries), locks: KeyLocks::new() }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }
}

impl Default for InMemoryCacher {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for InMemoryCacher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryCacher")
            .field("max_size", &self.max_size)
            .field("len", &lock(&self.entries).len())
            .finish_non_exhaustive()
    }
}

impl StringCacher for InMemoryCacher {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut entries = lock(&self.entries);
        let value = if self.max_size.is_some() { entries.get(key) } else { entries.peek(key) };
        Ok(value.cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        if self.max_size == Some(0) {
            return Ok(());
        }
        let pushed = lock(&self.entries).push(key.to_string(), value.to_string());
        if let Some((evicted, _)) = pushed
            && evicted != key
        {
            tracing::debug!(key = %evicted, max_size = ?self.max_size, "evicted least recently used entry");
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        lock(&self.entries).clear();
        Ok(())
    }

    fn len(&self) -> Result<usize, Error> {
        Ok(lock(&self.entries).len())
    }

    fn key_locks(&self) -> &KeyLocks {
        &self.locks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn keys_in_order(cache: &InMemoryCacher) -> Vec<String> {
        lock(&cache.entries).iter().map(|(k, _)| k.clone()).collect()
    }

    #[test]
    fn test_get_set() {
        let cache = InMemoryCacher::unbounded();
        assert_eq!(cache.get("a").unwrap(), None);
        cache.set("a", "1").unwrap();
        assert_eq!(cache.get("a").unwrap().as_deref(), Some("1"));
        cache.set("a", "2").unwrap();
        assert_eq!(cache.get("a").unwrap().as_deref(), Some("2"));
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_unbounded_never_evicts() {
        let cache = InMemoryCacher::new(None);
        for i in 0..1000 {
            cache.set(&format!("k{i}"), "v").unwrap();
        }
        assert_eq!(cache.len().unwrap(), 1000);
        assert!(cache.get("k0").unwrap().is_some());
    }

    #[test]
    fn test_bounded_evicts_least_recently_used() {
        let cache = InMemoryCacher::new(Some(2));
        cache.set("a", "1").unwrap();
        cache.set("b", "2").unwrap();
        // touch "a" so "b" becomes the oldest
        assert!(cache.get("a").unwrap().is_some());
        cache.set("c", "3").unwrap();

        assert_eq!(cache.len().unwrap(), 2);
        assert!(cache.get("b").unwrap().is_none());
        assert!(cache.get("a").unwrap().is_some());
        assert!(cache.get("c").unwrap().is_some());
    }

    #[test]
    fn test_unbounded_hit_keeps_order() {
        let cache = InMemoryCacher::unbounded();
        for key in ["a", "b", "c"] {
            cache.set(key, "v").unwrap();
        }
        let before = keys_in_order(&cache);
        assert!(cache.get("a").unwrap().is_some());
        assert_eq!(keys_in_order(&cache), before);
    }

    #[test]
    fn test_bounded_hit_refreshes_recency() {
        let cache = InMemoryCacher::new(Some(3));
        for key in ["a", "b", "c"] {
            cache.set(key, "v").unwrap();
        }
        assert!(cache.get("a").unwrap().is_some());
        assert_eq!(keys_in_order(&cache).first().map(String::as_str), Some("a"));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = InMemoryCacher::new(Some(0));
        cache.set("a", "1").unwrap();
        assert!(cache.is_empty().unwrap());
        assert_eq!(cache.get_or_compute("a", &mut || Ok::<_, Error>("1".to_string())).unwrap(), "1");
    }

    #[test]
    fn test_clear() {
        let cache = InMemoryCacher::unbounded();
        cache.set("a", "1").unwrap();
        cache.clear().unwrap();
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_get_or_compute_caches() {
        let cache = InMemoryCacher::unbounded();
        let calls = AtomicUsize::new(0);
        let mut compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>("value".to_string())
        };
        assert_eq!(cache.get_or_compute("k", &mut compute).unwrap(), "value");
        assert_eq!(cache.get_or_compute("k", &mut compute).unwrap(), "value");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_or_compute_error_not_cached() {
        let cache = InMemoryCacher::unbounded();
        let result = cache.get_or_compute("k", &mut || Err(Error::InvalidArgument("boom".into())));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert!(cache.get("k").unwrap().is_none());
    }

    #[test]
    fn test_get_or_compute_concurrent_single_computation() {
        let cache = InMemoryCacher::unbounded();
        let calls = AtomicUsize::new(0);

        let results: Vec<String> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        cache
                            .get_or_compute("shared", &mut || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(20));
                                Ok("computed".to_string())
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == "computed"));
    }

    #[test]
    fn test_get_or_compute_unrelated_keys_do_not_contend() {
        let cache = InMemoryCacher::unbounded();
        let cache = &cache;
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        thread::scope(|s| {
            let blocked = s.spawn(move || {
                cache.get_or_compute("a", &mut || {
                    started_tx.send(()).unwrap();
                    release_rx
                        .recv_timeout(Duration::from_secs(5))
                        .map_err(|_| Error::InvalidArgument("compute for a was never released".into()))?;
                    Ok("a".to_string())
                })
            });

            started_rx.recv().unwrap();
            let b = cache.get_or_compute("b", &mut || Ok("b".to_string())).unwrap();
            release_tx.send(()).unwrap();

            assert_eq!(b, "b");
            assert_eq!(blocked.join().unwrap().unwrap(), "a");
        });
    }
}
