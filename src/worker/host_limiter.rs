//! §4.4.5 — per-host concurrency cap, a `PoolMap` whose values are opaque
//! sentinels; only the counting matters.

use crate::pooling::{PoolGuard, PoolMap};
use std::convert::Infallible;

type Factory = fn(String) -> std::future::Ready<Result<(), Infallible>>;

pub struct HostLimiter {
    inner: PoolMap<String, (), Factory>,
}

impl HostLimiter {
    #[must_use]
    pub fn new(max_connections_per_host: usize) -> Self {
        Self {
            inner: PoolMap::new(
                (|_key: String| std::future::ready(Ok(()))) as Factory,
                max_connections_per_host,
                None,
            ),
        }
    }

    /// Scopes one slot for the duration of a fetch to `origin` (a
    /// `scheme:authority` key). Never fails: the factory is infallible.
    pub async fn scope(&self, origin: String) -> PoolGuard<String, (), Factory> {
        self.inner
            .scoped(origin)
            .await
            .unwrap_or_else(|never: Infallible| match never {})
    }
}
