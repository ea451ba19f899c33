use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;
use tracing::{error, trace};

/// Capacity of the callback token cache.
pub const CALLBACK_TOKEN_CAPACITY: usize = 10_000;

/// Capacity of the in-flight zap request cache.
pub const ZAP_REQUEST_CAPACITY: usize = 100;

/// Bounded least-recently-used map shared between request handlers.
///
/// There is no time based expiry; capacity pressure is the only way an entry
/// disappears besides an explicit [`TokenCache::remove`]. Reads touch the
/// entry. The lock is only held for the map operation itself, never across
/// an `.await`.
pub struct TokenCache<K: Hash + Eq, V> {
    name: &'static str,
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> TokenCache<K, V> {
    /// A zero `capacity` is bumped to one.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<K, V>> {
        // A panic while holding the guard cannot leave the LRU list half
        // updated, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| {
            error!(cache = self.name, "Cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Insert or overwrite, evicting the least recently used entry when full.
    pub fn put(&self, key: K, value: V) {
        let mut cache = self.lock();
        if cache.push(key, value).is_some() {
            trace!(cache = self.name, "Replaced entry or evicted least recently used one");
        }
    }

    /// Look up without removing, marking the entry as recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).cloned()
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().pop(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}

impl<K: Hash + Eq, V> fmt::Debug for TokenCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.inner.try_lock().map(|c| c.len()).ok();
        f.debug_struct("TokenCache")
            .field("name", &self.name)
            .field("len", &len)
            .finish()
    }
}
