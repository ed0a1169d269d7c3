//! §4.3.1 — `PrefetchBuffer`: a background filler continuously pre-fetches
//! candidate URLs from storage into an in-memory dispense queue; `take(n)`
//! drains it into worker-facing `QueueItem`s.

use crate::config::PrefetchConfig;
use crate::manager::given_cache::GivenCache;
use crate::manager::storage::Storage;
use crate::model::{timestamp, QueueItem, UrlRecord};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Background filler loop: one `storage.query_new_random` call produces
/// one buffer entry (a batch), matching the spec's "single producer,
/// single consumer... one storage fetch -> one buffer entry" semantics.
pub async fn run_filler(
    storage: Arc<dyn Storage>,
    sender: mpsc::Sender<Vec<UrlRecord>>,
    single_limit: usize,
    active: Arc<AtomicBool>,
) {
    tracing::debug!("prefetch filler started");
    while active.load(Ordering::Relaxed) {
        match storage.query_new_random(single_limit).await {
            Ok(records) if records.is_empty() => {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            Ok(records) => {
                if sender.send(records).await.is_err() {
                    break;
                }
            }
            Err(error) => {
                tracing::warn!(?error, "prefetch filler: storage query failed");
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        }
    }
    tracing::debug!("prefetch filler stopped");
}

pub struct PrefetchBuffer {
    receiver: Mutex<mpsc::Receiver<Vec<UrlRecord>>>,
    pending: Mutex<VecDeque<UrlRecord>>,
    given_cache: GivenCache,
    cache_ttl: Duration,
    get_timeout: Duration,
    min_revisit: chrono::Duration,
}

impl PrefetchBuffer {
    #[must_use]
    pub fn new(
        receiver: mpsc::Receiver<Vec<UrlRecord>>,
        given_cache: GivenCache,
        config: &PrefetchConfig,
        min_revisit_minutes: i64,
    ) -> Self {
        Self {
            receiver: Mutex::new(receiver),
            pending: Mutex::new(VecDeque::new()),
            given_cache,
            cache_ttl: Duration::from_secs(config.cache_timeout_secs),
            get_timeout: Duration::from_millis(config.get_timeout_ms),
            min_revisit: chrono::Duration::minutes(min_revisit_minutes),
        }
    }

    /// Drains batches until `n` records are accumulated or the buffer
    /// stalls (no batch arrives within `get_timeout`), caches each
    /// dispensed record, drops records revisited too recently, and
    /// projects the rest to `QueueItem`s.
    pub async fn take(&self, n: usize) -> Vec<QueueItem> {
        let mut pending = self.pending.lock().await;

        while pending.len() < n {
            let mut receiver = self.receiver.lock().await;
            match tokio::time::timeout(self.get_timeout, receiver.recv()).await {
                Ok(Some(batch)) => pending.extend(batch),
                Ok(None) | Err(_) => break,
            }
        }

        let take_count = n.min(pending.len());
        let dispensed: Vec<UrlRecord> = pending.drain(..take_count).collect();
        drop(pending);

        let now = Utc::now().naive_utc();
        let mut out = Vec::with_capacity(dispensed.len());
        for record in dispensed {
            self.given_cache.insert(record.clone(), self.cache_ttl);

            let is_recent = record
                .visited
                .as_deref()
                .and_then(timestamp::parse)
                .is_some_and(|visited| now - visited < self.min_revisit);
            if is_recent {
                continue;
            }
            out.push(QueueItem::from(&record));
        }
        out
    }
}
