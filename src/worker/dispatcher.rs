//! §4.4.2 — the task pool that drains `FetchQueue` and the `process()`
//! per-URL state machine.

use crate::error::CrawlError;
use crate::model::{timestamp, Report};
use crate::worker::fetch_client::FetchOutcomeOrCancel;
use crate::worker::host_limiter::HostLimiter;
use crate::worker::link_extractor::extract_links;
use crate::worker::manager_client::ManagerClient;
use crate::worker::robots::RobotsCache;
use crate::worker::{FetchClient, FetchQueue};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use url::Url;

const IDLE_YIELD: Duration = Duration::from_millis(20);

pub struct Dispatcher {
    queue: Arc<FetchQueue>,
    manager: Arc<ManagerClient>,
    fetch_client: Arc<FetchClient>,
    robots: Arc<RobotsCache>,
    host_limiter: Arc<HostLimiter>,
    closed: Arc<AtomicBool>,
    permits: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    socket_timeout: Duration,
    user_agent: String,
}

impl Dispatcher {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<FetchQueue>,
        manager: Arc<ManagerClient>,
        fetch_client: Arc<FetchClient>,
        robots: Arc<RobotsCache>,
        host_limiter: Arc<HostLimiter>,
        closed: Arc<AtomicBool>,
        max_connections: usize,
        socket_timeout: Duration,
        user_agent: String,
    ) -> Self {
        Self {
            queue,
            manager,
            fetch_client,
            robots,
            host_limiter,
            closed,
            permits: Arc::new(Semaphore::new(max_connections)),
            active: Arc::new(AtomicUsize::new(0)),
            socket_timeout,
            user_agent,
        }
    }

    /// Main loop: while not closed, non-blocking dequeue + spawn, or yield.
    /// `one_shot = true` means an empty queue triggers graceful stop
    /// instead of continuing to poll.
    pub async fn run(&self, one_shot: bool) {
        tracing::debug!("dispatcher started");
        loop {
            if self.closed.load(Ordering::Relaxed) {
                break;
            }
            match self.queue.try_take().await {
                Some(item) => {
                    let permit = Arc::clone(&self.permits)
                        .acquire_owned()
                        .await
                        .expect("semaphore never closed");
                    self.active.fetch_add(1, Ordering::SeqCst);
                    let manager = Arc::clone(&self.manager);
                    let fetch_client = Arc::clone(&self.fetch_client);
                    let robots = Arc::clone(&self.robots);
                    let host_limiter = Arc::clone(&self.host_limiter);
                    let closed = Arc::clone(&self.closed);
                    let active = Arc::clone(&self.active);
                    let socket_timeout = self.socket_timeout;
                    let user_agent = self.user_agent.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        process(
                            item,
                            manager.as_ref(),
                            fetch_client.as_ref(),
                            robots.as_ref(),
                            host_limiter.as_ref(),
                            closed.as_ref(),
                            socket_timeout,
                            &user_agent,
                        )
                        .await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    });
                }
                None => {
                    if one_shot {
                        break;
                    }
                    tokio::time::sleep(IDLE_YIELD).await;
                }
            }
        }
        tracing::debug!("dispatcher loop exited");
    }

    pub fn stop(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    /// §4.4.6 `gracefulStop`: marks closed and waits for in-flight tasks to
    /// drain, bounded by `timeout`. Returns whether it drained in time.
    pub async fn graceful_stop(&self, timeout: Option<Duration>) -> bool {
        self.stop();
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.active.load(Ordering::SeqCst) == 0 {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// §4.4.2 — the per-URL state machine.
async fn process(
    item: crate::model::QueueItem,
    manager: &ManagerClient,
    fetch_client: &FetchClient,
    robots: &RobotsCache,
    host_limiter: &HostLimiter,
    closed: &AtomicBool,
    socket_timeout: Duration,
    user_agent: &str,
) {
    let mut report = Report {
        url: Some(item.url.clone()),
        ..Default::default()
    };

    let parsed = match Url::parse(&item.url) {
        Ok(u) if u.host_str().is_some() => u,
        _ => {
            report.result = Some("Invalid URI".into());
            let _ = manager.report_result(&report).await;
            return;
        }
    };

    if percent_encoding_is_malformed(parsed.path()) {
        report.result = Some("Malformed URL quoting".into());
        let _ = manager.report_result(&report).await;
        return;
    }

    let origin = format!("{}://{}", parsed.scheme(), parsed.authority());

    match robots
        .ask_robots(origin.clone(), user_agent, parsed.path())
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            report.result = Some("Deny by robots.txt".into());
            let _ = manager.report_result(&report).await;
            return;
        }
        Err(error) => {
            report.result = Some(crawl_error_message(&error));
            let _ = manager.report_result(&report).await;
            return;
        }
    }

    let host_key = format!("{}:{}", parsed.scheme(), parsed.authority());
    let _host_slot = host_limiter.scope(host_key).await;

    let start = Instant::now();
    let fetch_result = tokio::time::timeout(socket_timeout, fetch_client.fetch(&item.url)).await;
    report.fetch_time_ms = Some(start.elapsed().as_millis() as u64);

    let outcome = match fetch_result {
        Err(_elapsed) => {
            report.result = Some("Fetch timeout".into());
            let _ = manager.report_result(&report).await;
            return;
        }
        Ok(Err(_dead)) => {
            closed.store(true, Ordering::Relaxed);
            report.result = Some("io-worker subprocess is dead".into());
            let _ = manager.report_result(&report).await;
            return;
        }
        Ok(Ok(FetchOutcomeOrCancel::Cancelled)) => {
            report.result = Some("cancelled".into());
            let _ = manager.report_result(&report).await;
            return;
        }
        Ok(Ok(FetchOutcomeOrCancel::Outcome(outcome))) => outcome,
    };

    report.result = Some(outcome.result.clone());
    report.status_code = outcome.status_code;
    report.headers = outcome.headers.clone();

    if outcome.status_code == Some(200) {
        match std::str::from_utf8(&outcome.content) {
            Ok(body) => {
                report.links = Some(extract_links(body, &item.url));
                report.content = Some(outcome.content);
            }
            Err(error) => {
                report.result = Some(format!("Parse Error: {error}"));
                report.content = Some(outcome.content);
            }
        }
    }

    report.visited = Some(timestamp::now_string());
    let _ = manager.report_result(&report).await;
}

fn crawl_error_message(error: &CrawlError) -> String {
    match error {
        CrawlError::Fetch(message) | CrawlError::Robots(message) => message.clone(),
    }
}

/// Percent-encoding is malformed if a `%` is not followed by two hex
/// digits.
fn percent_encoding_is_malformed(path: &str) -> bool {
    let bytes = path.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3);
            match hex {
                Some(h) if h.iter().all(u8::is_ascii_hexdigit) => i += 3,
                _ => return true,
            }
        } else {
            i += 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_percent_encoding_passes() {
        assert!(!percent_encoding_is_malformed("/a%20b/c"));
    }

    #[test]
    fn truncated_percent_escape_is_malformed() {
        assert!(percent_encoding_is_malformed("/a%2"));
    }

    #[test]
    fn non_hex_after_percent_is_malformed() {
        assert!(percent_encoding_is_malformed("/a%zz"));
    }
}
