//! Shared test doubles for the manager's integration tests.

use async_trait::async_trait;
use crawlmesh::error::StorageError;
use crawlmesh::manager::Storage;
use crawlmesh::model::UrlRecord;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// A `Storage` double whose `query_new_random` hands out pre-seeded
/// batches once each (mirroring one real `visited`-filtered query per
/// call), and records every `save`/`update`/`save_content` call for
/// assertions.
pub struct StubStorage {
    batches: Mutex<VecDeque<Vec<UrlRecord>>>,
    pub updates: Mutex<Vec<UrlRecord>>,
    pub saved_content: Mutex<Vec<(String, Vec<u8>, Option<String>)>>,
}

impl StubStorage {
    #[must_use]
    pub fn new(batches: Vec<Vec<UrlRecord>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            updates: Mutex::new(Vec::new()),
            saved_content: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Storage for StubStorage {
    async fn query_new_random(&self, _limit: usize) -> Result<Vec<UrlRecord>, StorageError> {
        Ok(self.batches.lock().await.pop_front().unwrap_or_default())
    }

    async fn query_by_url_one(&self, url: &str) -> Result<Option<UrlRecord>, StorageError> {
        Ok(self
            .updates
            .lock()
            .await
            .iter()
            .find(|r| r.url == url)
            .cloned())
    }

    async fn save(&self, record: &UrlRecord, _force_update: bool) -> Result<bool, StorageError> {
        self.updates.lock().await.push(record.clone());
        Ok(true)
    }

    async fn update(
        &self,
        records: &[UrlRecord],
        _all_or_nothing: bool,
        _ensure_commit: bool,
    ) -> Result<Vec<bool>, StorageError> {
        let mut updates = self.updates.lock().await;
        for record in records {
            if let Some(existing) = updates.iter_mut().find(|r| r.url == record.url) {
                *existing = record.clone();
            } else {
                updates.push(record.clone());
            }
        }
        Ok(vec![true; records.len()])
    }

    async fn save_content(
        &self,
        url: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        self.saved_content
            .lock()
            .await
            .push((url.to_string(), content.to_vec(), content_type.map(str::to_string)));
        Ok(())
    }
}
