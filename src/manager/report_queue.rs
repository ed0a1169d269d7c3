//! §4.3.2 — `ReportQueue` and the background flusher.
//!
//! Duplicate suppression is deliberately two-layered (a linear scan here in
//! `accept`, a second linear scan in the flusher's batch) per §9 Design
//! Notes' "Duplicate suppression across queue + cache": "at most two
//! duplicates may slip through" is accepted rather than tightened with a
//! global lock.

use crate::manager::given_cache::GivenCache;
use crate::manager::storage::Storage;
use crate::model::{Report, UrlRecord};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// One queued report, still carrying its (optional) body so the flusher
/// can strip it out and hand it to `storage.saveContent` separately.
#[derive(Debug, Clone)]
pub struct QueuedReport {
    pub record: UrlRecord,
    pub content: Option<Vec<u8>>,
    pub content_type: Option<String>,
}

/// Bounded FIFO of incoming report records.
pub struct ReportQueue {
    items: Mutex<VecDeque<QueuedReport>>,
    capacity: usize,
    given_cache: GivenCache,
}

impl ReportQueue {
    #[must_use]
    pub fn new(capacity: usize, given_cache: GivenCache) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            given_cache,
        }
    }

    /// §4.3.2 `acceptReport`.
    pub async fn accept(&self, report: Report) {
        let Some(url) = report.url.clone() else {
            // Force-append: unconditionally pushed, bypassing idempotence
            // checks (§9 Open Questions treats this as intentional).
            if let Some(links) = &report.links {
                let mut seen = std::collections::HashSet::new();
                let mut items = self.items.lock().await;
                for link in links {
                    if seen.insert(link.clone()) {
                        push_bounded(
                            &mut items,
                            self.capacity,
                            QueuedReport {
                                record: UrlRecord::stub(link.clone(), None),
                                content: None,
                                content_type: None,
                            },
                        );
                    }
                }
            }
            return;
        };

        let mut items = self.items.lock().await;
        if items.iter().any(|item| item.record.url == url) {
            tracing::debug!(%url, "report dropped: duplicate already queued");
            return;
        }

        let record = match self.given_cache.pop(&url) {
            Some(mut cached) => {
                cached.merge_report(&report);
                cached
            }
            None => {
                let mut record = UrlRecord::stub(url, None);
                record.merge_report(&report);
                record
            }
        };
        push_bounded(
            &mut items,
            self.capacity,
            QueuedReport {
                record,
                content: report.content.clone(),
                content_type: report.content_type.clone(),
            },
        );
    }

    async fn drain_up_to(&self, n: usize) -> Vec<QueuedReport> {
        let mut items = self.items.lock().await;
        let n = n.min(items.len());
        items.drain(..n).collect()
    }

    /// Puts a previously-drained, not-yet-committed batch back at the
    /// front of the queue, oldest first, so the next flush tick retries it
    /// ahead of anything accepted in the meantime.
    async fn requeue_front(&self, batch: Vec<QueuedReport>) {
        let mut items = self.items.lock().await;
        for report in batch.into_iter().rev() {
            items.push_front(report);
        }
    }

    #[must_use]
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }
}

fn push_bounded(items: &mut VecDeque<QueuedReport>, capacity: usize, report: QueuedReport) {
    if items.len() >= capacity {
        tracing::warn!(url = %report.record.url, "report queue at capacity, dropping oldest");
        items.pop_front();
    }
    items.push_back(report);
}

/// Background flusher: accumulates up to `flush_size` items, waiting at
/// most `flush_delay` between items, then commits the batch to storage. A
/// storage failure requeues the whole batch at the front instead of
/// dropping it, so the next tick retries the same records.
pub async fn run_flusher(
    queue: Arc<ReportQueue>,
    storage: Arc<dyn Storage>,
    flush_size: usize,
    flush_delay: Duration,
    active: Arc<AtomicBool>,
) {
    tracing::debug!("report flusher started");
    while active.load(Ordering::Relaxed) {
        let batch = collect_batch(&queue, flush_size, flush_delay).await;
        if batch.is_empty() {
            continue;
        }

        let batch = dedup_last_writer_wins(batch);
        if let Err(error) = flush_batch(storage.as_ref(), batch.clone()).await {
            tracing::warn!(?error, "flusher: storage write failed, requeuing batch for next tick");
            queue.requeue_front(batch).await;
        }
    }
    tracing::debug!("report flusher stopped");
}

async fn collect_batch(
    queue: &ReportQueue,
    flush_size: usize,
    flush_delay: Duration,
) -> Vec<QueuedReport> {
    let mut batch = Vec::new();
    while batch.len() < flush_size {
        let remaining = queue.drain_up_to(flush_size - batch.len()).await;
        if remaining.is_empty() {
            if batch.is_empty() {
                tokio::time::sleep(flush_delay).await;
            }
            break;
        }
        batch.extend(remaining);
        if batch.len() < flush_size {
            tokio::time::sleep(flush_delay).await;
        }
    }
    batch
}

/// Second-pass dedup: later entries for the same URL replace earlier ones.
fn dedup_last_writer_wins(batch: Vec<QueuedReport>) -> Vec<QueuedReport> {
    let mut by_url: indexmap::IndexMap<String, QueuedReport> = indexmap::IndexMap::new();
    for report in batch {
        by_url.insert(report.record.url.clone(), report);
    }
    by_url.into_values().collect()
}

async fn flush_batch(
    storage: &dyn Storage,
    batch: Vec<QueuedReport>,
) -> Result<(), crate::error::StorageError> {
    let mut metadata = Vec::with_capacity(batch.len());

    for queued in batch {
        // A record born as an extracted link has no prior identity in
        // storage; persist it before the content save so later writes
        // have a target.
        if storage.query_by_url_one(&queued.record.url).await?.is_none() {
            storage.save(&queued.record, true).await?;
        }
        if let Some(content) = &queued.content {
            storage
                .save_content(&queued.record.url, content, queued.content_type.as_deref())
                .await?;
        }
        metadata.push(queued.record);
    }

    storage.update(&metadata, true, true).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_url_is_dropped_if_already_queued() {
        let queue = ReportQueue::new(10, GivenCache::new());
        queue
            .accept(Report {
                url: Some("http://a/".into()),
                result: Some("OK".into()),
                ..Default::default()
            })
            .await;
        queue
            .accept(Report {
                url: Some("http://a/".into()),
                result: Some("second".into()),
                ..Default::default()
            })
            .await;
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn force_append_links_are_unconditionally_pushed() {
        let queue = ReportQueue::new(10, GivenCache::new());
        queue
            .accept(Report {
                url: None,
                links: Some(vec!["http://x/".into(), "http://x/".into(), "http://y/".into()]),
                ..Default::default()
            })
            .await;
        assert_eq!(queue.len().await, 2, "distinct links only");
    }

    #[tokio::test]
    async fn report_merges_with_given_cache_entry() {
        let cache = GivenCache::new();
        cache.insert(UrlRecord::stub("http://a/", None), Duration::from_secs(60));
        let queue = ReportQueue::new(10, cache);
        queue
            .accept(Report {
                url: Some("http://a/".into()),
                result: Some("OK".into()),
                status_code: Some(200),
                ..Default::default()
            })
            .await;
        let batch = collect_batch(&queue, 10, Duration::from_millis(5)).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].record.result.as_deref(), Some("OK"));
    }

    #[tokio::test]
    async fn dedup_keeps_later_entry_for_same_url() {
        let mut a = UrlRecord::stub("http://a/", None);
        a.result = Some("first".into());
        let mut b = UrlRecord::stub("http://a/", None);
        b.result = Some("second".into());
        let c = UrlRecord::stub("http://b/", None);
        let wrap = |r: UrlRecord| QueuedReport {
            record: r,
            content: None,
            content_type: None,
        };

        let deduped = dedup_last_writer_wins(vec![wrap(a), wrap(b), wrap(c)]);
        assert_eq!(deduped.len(), 2);
        let a_entry = deduped.iter().find(|r| r.record.url == "http://a/").unwrap();
        assert_eq!(a_entry.record.result.as_deref(), Some("second"));
    }

    use async_trait::async_trait;

    struct FailingStorage;

    #[async_trait]
    impl Storage for FailingStorage {
        async fn query_new_random(
            &self,
            _limit: usize,
        ) -> Result<Vec<UrlRecord>, crate::error::StorageError> {
            Ok(vec![])
        }
        async fn query_by_url_one(
            &self,
            _url: &str,
        ) -> Result<Option<UrlRecord>, crate::error::StorageError> {
            Ok(None)
        }
        async fn save(
            &self,
            _record: &UrlRecord,
            _force_update: bool,
        ) -> Result<bool, crate::error::StorageError> {
            Ok(true)
        }
        async fn update(
            &self,
            _records: &[UrlRecord],
            _all_or_nothing: bool,
            _ensure_commit: bool,
        ) -> Result<Vec<bool>, crate::error::StorageError> {
            Err(crate::error::StorageError::Conflict {
                url: "http://a/".into(),
            })
        }
        async fn save_content(
            &self,
            _url: &str,
            _content: &[u8],
            _content_type: Option<&str>,
        ) -> Result<(), crate::error::StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_flush_requeues_the_batch_instead_of_dropping_it() {
        let queue = Arc::new(ReportQueue::new(10, GivenCache::new()));
        queue
            .accept(Report {
                url: Some("http://a/".into()),
                result: Some("OK".into()),
                ..Default::default()
            })
            .await;

        let batch = queue.drain_up_to(10).await;
        assert_eq!(batch.len(), 1);
        let result = flush_batch(&FailingStorage, batch.clone()).await;
        assert!(result.is_err());
        queue.requeue_front(batch).await;

        assert_eq!(queue.len().await, 1, "failed batch must remain in the queue");
        let remaining = queue.drain_up_to(10).await;
        assert_eq!(remaining[0].record.url, "http://a/");
    }
}
