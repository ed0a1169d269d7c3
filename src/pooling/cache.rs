//! A time-expiring `K -> V` map.
//!
//! Keeps one `DashMap<K, Entry<V>>` and mutates entries without a global
//! lock, the same shape as a lock-free per-key rate limiter built on
//! `DashMap<String, Arc<...>>`. `Cache` is simpler — entries are plain
//! values, not atomics.
//!
//! Each entry carries a generation counter. Scheduling an expiration spawns
//! a `tokio::task` that sleeps for the TTL and then removes the entry only
//! if its generation is unchanged, so a late timer firing after the key was
//! overwritten or deleted is a no-op — no explicit cancellation handle is
//! needed.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Entry<V> {
    value: V,
    generation: u64,
}

/// A time-expiring map. Reads never block on the expiration machinery.
pub struct Cache<K, V> {
    entries: Arc<DashMap<K, Entry<V>>>,
    next_generation: Arc<AtomicU64>,
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Installs `value` at `key`. With `ttl = Some(d)`, schedules automatic
    /// deletion of `key` after `d` elapses, cancelling any previously
    /// scheduled expiration for `key`. With `ttl = None`, the entry never
    /// expires.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.insert(key.clone(), Entry { value, generation });

        if let Some(ttl) = ttl {
            let entries = Arc::clone(&self.entries);
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                if let Some(entry) = entries.get(&key) {
                    if entry.generation == generation {
                        drop(entry);
                        entries.remove(&key);
                    }
                }
            });
        }
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|e| e.value.clone())
    }

    /// Removes and returns the value at `key`, if present. Any scheduled
    /// expiration for it is implicitly cancelled (the generation check in
    /// the timer task will no longer find a matching entry).
    pub fn pop(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, e)| e.value)
    }

    pub fn delete(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            next_generation: Arc::clone(&self.next_generation),
        }
    }
}
