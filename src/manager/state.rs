//! §4.3.3 — manager state machine: `active` flips `false -> true` on the
//! first request served, spinning up both background tasks; flips back on
//! shutdown, and both tasks observe the flag and exit within one tick of
//! their respective poll interval.

use crate::config::ManagerConfig;
use crate::manager::given_cache::GivenCache;
use crate::manager::prefetch::{self, PrefetchBuffer};
use crate::manager::report_queue::{self, ReportQueue};
use crate::manager::storage::Storage;
use crate::model::UrlRecord;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub struct ManagerState {
    pub config: ManagerConfig,
    pub storage: Arc<dyn Storage>,
    pub prefetch: Arc<PrefetchBuffer>,
    pub reports: Arc<ReportQueue>,
    active: Arc<AtomicBool>,
    /// `Some` until the first `mark_active()` call spawns the background
    /// tasks and takes it, so they start exactly once.
    prefetch_sender: Mutex<Option<mpsc::Sender<Vec<UrlRecord>>>>,
}

impl ManagerState {
    #[must_use]
    pub fn new(config: ManagerConfig, storage: Arc<dyn Storage>) -> Self {
        let given_cache = GivenCache::new();
        let (tx, rx) = mpsc::channel::<Vec<UrlRecord>>(config.prefetch.queue_size.max(1));
        let prefetch = Arc::new(PrefetchBuffer::new(
            rx,
            given_cache.clone(),
            &config.prefetch,
            config.api.min_revisit_minutes,
        ));
        let reports = Arc::new(ReportQueue::new(config.postreport.queue_size, given_cache));

        Self {
            config,
            storage,
            prefetch,
            reports,
            active: Arc::new(AtomicBool::new(false)),
            prefetch_sender: Mutex::new(Some(tx)),
        }
    }

    fn spawn_background_tasks(&self, sender: mpsc::Sender<Vec<UrlRecord>>) {
        let storage = Arc::clone(&self.storage);
        let single_limit = self.config.prefetch.single_limit;
        let active = Arc::clone(&self.active);
        tokio::spawn(prefetch::run_filler(storage, sender, single_limit, active));

        let reports = Arc::clone(&self.reports);
        let storage = Arc::clone(&self.storage);
        let flush_size = self.config.postreport.flush_size;
        let flush_delay = self.config.flush_delay();
        let active = Arc::clone(&self.active);
        tokio::spawn(report_queue::run_flusher(
            reports,
            storage,
            flush_size,
            flush_delay,
            active,
        ));
    }

    /// `false -> true` on first request served; spins up both background
    /// tasks exactly once. A no-op on subsequent calls.
    pub fn mark_active(&self) {
        if !self.active.swap(true, Ordering::Relaxed) {
            if let Some(sender) = self
                .prefetch_sender
                .lock()
                .expect("prefetch sender mutex poisoned")
                .take()
            {
                self.spawn_background_tasks(sender);
            }
        }
    }

    pub fn shutdown(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}
