//! A map of keyed, bounded resource pools with lazy per-key async
//! construction.
//!
//! Idle eviction is expressed as "last-release timestamp per key plus a
//! periodic sweeper" rather than one timer per pool: a background task
//! wakes on an interval, and for every
//! pool whose slots are all free and whose free-since timestamp is older
//! than `idle_ttl`, drops the pool. Any `acquire` on a key transparently
//! reconstructs its pool via `DashMap`'s entry API, so a new acquire after
//! eviction just looks like a cold start — which is also how "any new
//! `acquire(k, ...)` cancels the eviction" falls out for free: once a slot
//! is outstanding, the pool no longer looks idle to the sweeper.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

struct PoolInner<V> {
    free: VecDeque<V>,
    outstanding: usize,
    last_full_release: Option<Instant>,
}

struct Pool<V> {
    max_size: usize,
    inner: Mutex<PoolInner<V>>,
    notify: Notify,
}

impl<V> Pool<V> {
    fn new(max_size: usize) -> Self {
        Self {
            max_size,
            inner: Mutex::new(PoolInner {
                free: VecDeque::new(),
                outstanding: 0,
                last_full_release: None,
            }),
            notify: Notify::new(),
        }
    }

    fn is_idle_since(&self, ttl: Duration, now: Instant) -> bool {
        let inner = self.inner.lock().expect("pool mutex poisoned");
        inner.outstanding == 0
            && inner.free.len() == self.max_size
            && inner
                .last_full_release
                .is_some_and(|since| now.duration_since(since) >= ttl)
    }

    fn release(&self, value: V) {
        let mut inner = self.inner.lock().expect("pool mutex poisoned");
        inner.free.push_back(value);
        inner.outstanding = inner.outstanding.saturating_sub(1);
        if inner.free.len() == self.max_size {
            inner.last_full_release = Some(Instant::now());
        }
        self.notify.notify_one();
    }
}

enum Slot<V> {
    Ready(V),
    MustConstruct,
    MustWait,
}

fn take_slot<V>(pool: &Pool<V>) -> Slot<V> {
    let mut inner = pool.inner.lock().expect("pool mutex poisoned");
    if let Some(v) = inner.free.pop_front() {
        inner.outstanding += 1;
        Slot::Ready(v)
    } else if inner.outstanding < pool.max_size {
        inner.outstanding += 1;
        Slot::MustConstruct
    } else {
        Slot::MustWait
    }
}

fn release_reservation<V>(pool: &Pool<V>) {
    let mut inner = pool.inner.lock().expect("pool mutex poisoned");
    inner.outstanding = inner.outstanding.saturating_sub(1);
    drop(inner);
    pool.notify.notify_one();
}

/// A map of keyed bounded pools. `V` is opaque to `PoolMap` — only the
/// counting matters.
pub struct PoolMap<K, V, F> {
    pools: Arc<DashMap<K, Arc<Pool<V>>>>,
    factory: Arc<F>,
    max_per_pool: usize,
}

impl<K, V, F> Clone for PoolMap<K, V, F> {
    fn clone(&self) -> Self {
        Self {
            pools: Arc::clone(&self.pools),
            factory: Arc::clone(&self.factory),
            max_per_pool: self.max_per_pool,
        }
    }
}

impl<K, V, F, Fut, E> PoolMap<K, V, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send,
{
    /// `idle_ttl`, if given, starts a background sweeper evicting pools
    /// that have sat fully-free for at least that long.
    pub fn new(factory: F, max_per_pool: usize, idle_ttl: Option<Duration>) -> Self {
        let pools: Arc<DashMap<K, Arc<Pool<V>>>> = Arc::new(DashMap::new());

        if let Some(ttl) = idle_ttl {
            let pools = Arc::clone(&pools);
            let sweep_interval = (ttl / 4).max(Duration::from_secs(1));
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sweep_interval);
                loop {
                    interval.tick().await;
                    let now = Instant::now();
                    let stale: Vec<K> = pools
                        .iter()
                        .filter(|e| e.value().is_idle_since(ttl, now))
                        .map(|e| e.key().clone())
                        .collect();
                    for key in stale {
                        pools.remove(&key);
                    }
                }
            });
        }

        Self {
            pools,
            factory: Arc::new(factory),
            max_per_pool,
        }
    }

    fn pool_for(&self, key: &K) -> Arc<Pool<V>> {
        Arc::clone(
            self.pools
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Pool::new(self.max_per_pool)))
                .value(),
        )
    }

    /// Blocks until a pool slot is free or a fresh `V` can be constructed,
    /// up to `max_per_pool` outstanding values per key.
    pub async fn acquire(&self, key: K) -> Result<V, E> {
        let pool = self.pool_for(&key);
        loop {
            match take_slot(&pool) {
                Slot::Ready(v) => return Ok(v),
                Slot::MustConstruct => match (self.factory)(key.clone()).await {
                    Ok(v) => return Ok(v),
                    Err(e) => {
                        release_reservation(&pool);
                        return Err(e);
                    }
                },
                Slot::MustWait => pool.notify.notified().await,
            }
        }
    }

    /// Returns a previously-acquired value to its pool.
    pub fn release(&self, key: &K, value: V) {
        self.pool_for(key).release(value);
    }

    /// Acquires a value, returning a guard that releases it automatically
    /// when dropped.
    pub async fn scoped(&self, key: K) -> Result<PoolGuard<K, V, F>, E> {
        let value = self.acquire(key.clone()).await?;
        Ok(PoolGuard {
            map: self.clone(),
            key,
            value: Some(value),
        })
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.pools.len()
    }
}

/// RAII guard returned by [`PoolMap::scoped`]. Releases its value back to
/// the pool on drop.
pub struct PoolGuard<K, V, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    map: PoolMap<K, V, F>,
    key: K,
    value: Option<V>,
}

impl<K, V, F> std::ops::Deref for PoolGuard<K, V, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    type Target = V;
    fn deref(&self) -> &V {
        self.value.as_ref().expect("value taken before drop")
    }
}

impl<K, V, F> Drop for PoolGuard<K, V, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.map.release(&self.key, value);
        }
    }
}
