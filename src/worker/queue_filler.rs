//! §4.4.1 — the background task that tops up `FetchQueue` from the manager.

use crate::worker::fetch_queue::FetchQueue;
use crate::worker::manager_client::ManagerClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const EMPTY_SLEEP: Duration = Duration::from_secs(10);

/// Loops: whenever the queue has room, asks the manager for up to that
/// many items and inserts each unless already queued; shuffles the queue
/// after a successful top-up. A full queue sleeps `full_queue_pause`. An
/// empty reply sleeps 10 s. A manager error marks the worker closed.
pub async fn run(
    queue: Arc<FetchQueue>,
    manager: Arc<ManagerClient>,
    max_queue_size: usize,
    full_queue_pause: Duration,
    closed: Arc<AtomicBool>,
) {
    tracing::debug!("queue filler started");
    while !closed.load(Ordering::Relaxed) {
        let qsize = queue.qsize().await;
        if qsize >= max_queue_size {
            tokio::time::sleep(full_queue_pause).await;
            continue;
        }

        match manager.get_crawl_queue(max_queue_size - qsize).await {
            Ok(items) if items.is_empty() => {
                tokio::time::sleep(EMPTY_SLEEP).await;
            }
            Ok(items) => {
                for item in items {
                    queue.insert_if_absent(item).await;
                }
                queue.shuffle().await;
            }
            Err(error) => {
                tracing::error!(?error, "queue filler: manager call failed, closing worker");
                closed.store(true, Ordering::Relaxed);
            }
        }
    }
    tracing::debug!("queue filler stopped");
}
