//! §4.4.1 — the worker's bounded FIFO of dispensed URLs.

use crate::model::QueueItem;
use rand::seq::SliceRandom;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// A bounded queue that refuses a URL already present (linear scan — the
/// queue is small, per §4.4.1).
pub struct FetchQueue {
    items: Mutex<VecDeque<QueueItem>>,
    capacity: usize,
}

impl FetchQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn qsize(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Inserts `item` unless its URL is already queued. Returns whether it
    /// was inserted.
    pub async fn insert_if_absent(&self, item: QueueItem) -> bool {
        let mut items = self.items.lock().await;
        if items.iter().any(|i| i.url == item.url) {
            return false;
        }
        items.push_back(item);
        true
    }

    /// Non-blocking dequeue of the item at the front.
    pub async fn try_take(&self) -> Option<QueueItem> {
        self.items.lock().await.pop_front()
    }

    /// Shuffles the queue so consecutive items rarely target the same
    /// host, spreading load across the per-host concurrency limiter.
    pub async fn shuffle(&self) {
        let mut items = self.items.lock().await;
        let mut as_vec: Vec<QueueItem> = items.drain(..).collect();
        as_vec.shuffle(&mut rand::rng());
        items.extend(as_vec);
    }
}
