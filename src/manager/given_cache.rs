//! `GivenCache` (§4.3.1, §4.3.2): a transient record of URLs dispensed but
//! not yet reported, keyed by URL, used to merge partial reports with
//! pre-known metadata. A thin typed wrapper over [`Cache`].

use crate::model::UrlRecord;
use crate::pooling::Cache;
use std::time::Duration;

#[derive(Clone)]
pub struct GivenCache {
    inner: Cache<String, UrlRecord>,
}

impl GivenCache {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Cache::new() }
    }

    pub fn insert(&self, record: UrlRecord, ttl: Duration) {
        self.inner.set(record.url.clone(), record, Some(ttl));
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Option<UrlRecord> {
        self.inner.get(&url.to_string())
    }

    pub fn pop(&self, url: &str) -> Option<UrlRecord> {
        self.inner.pop(&url.to_string())
    }
}

impl Default for GivenCache {
    fn default() -> Self {
        Self::new()
    }
}
