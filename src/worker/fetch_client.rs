//! §4.4.4 / §6.3 — `FetchClient`: a line-framed request/response protocol
//! over a spawned subprocess, with request coalescing and a `closed` escape
//! hatch. Subprocess wiring follows the donor's `tokio::process::Command`
//! usage style (`src/browser/mod.rs` spawns the headless browser the same
//! way: piped stdin/stdout, a dedicated reader task).

use crate::error::IoWorkerDead;
use crate::model::wire::{self, FetchOutcome};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{Mutex, Notify};

/// What `fetch` returns when the wait ends without a subprocess death:
/// either the parsed outcome, or a cancellation sentinel (worker closed
/// while the request was outstanding).
#[derive(Debug, Clone)]
pub enum FetchOutcomeOrCancel {
    Outcome(FetchOutcome),
    Cancelled,
}

struct Pending {
    notify: Notify,
    result: StdMutex<Option<FetchOutcomeOrCancel>>,
}

impl Pending {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            result: StdMutex::new(None),
        }
    }

    fn resolve(&self, outcome: FetchOutcomeOrCancel) {
        *self.result.lock().expect("pending mutex poisoned") = Some(outcome);
        self.notify.notify_waiters();
    }
}

/// Adapter over the out-of-process fetch engine (§6.3).
pub struct FetchClient {
    writer: Mutex<ChildStdin>,
    pending: Arc<DashMap<String, Arc<Pending>>>,
    dead: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    _child: Child,
}

impl FetchClient {
    /// Spawns `io_worker_path skip-robots` (§6.3: robots enforcement lives
    /// in the worker, not the fetch engine) and starts its reader task.
    pub async fn spawn(io_worker_path: &str, closed: Arc<AtomicBool>) -> std::io::Result<Self> {
        let mut child = tokio::process::Command::new(io_worker_path)
            .arg("skip-robots")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");

        let pending: Arc<DashMap<String, Arc<Pending>>> = Arc::new(DashMap::new());
        let dead = Arc::new(AtomicBool::new(false));

        tokio::spawn(reader_loop(
            BufReader::new(stdout),
            Arc::clone(&pending),
            Arc::clone(&dead),
        ));

        Ok(Self {
            writer: Mutex::new(stdin),
            pending,
            dead,
            closed,
            _child: child,
        })
    }

    /// Fetches `url`, coalescing concurrent callers for the same URL onto
    /// one subprocess round trip. Blocks until the response arrives, the
    /// worker closes, or the subprocess dies.
    pub async fn fetch(&self, url: &str) -> Result<FetchOutcomeOrCancel, IoWorkerDead> {
        if self.dead.load(Ordering::Relaxed) {
            return Err(IoWorkerDead);
        }

        let mut is_new = false;
        let entry = match self.pending.entry(url.to_string()) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                is_new = true;
                let p = Arc::new(Pending::new());
                e.insert(Arc::clone(&p));
                p
            }
        };

        if is_new {
            let mut writer = self.writer.lock().await;
            let line = format!("{url}\n");
            if writer.write_all(line.as_bytes()).await.is_err() {
                drop(writer);
                self.dead.store(true, Ordering::Relaxed);
                self.cancel_all();
                return Err(IoWorkerDead);
            }
        }

        loop {
            let notified = entry.notify.notified();
            if let Some(result) = entry.result.lock().expect("pending mutex poisoned").clone() {
                return Ok(result);
            }
            if self.closed.load(Ordering::Relaxed) {
                return Ok(FetchOutcomeOrCancel::Cancelled);
            }
            if self.dead.load(Ordering::Relaxed) {
                return Err(IoWorkerDead);
            }
            tokio::select! {
                () = notified => {},
                () = tokio::time::sleep(std::time::Duration::from_millis(50)) => {},
            }
        }
    }

    fn cancel_all(&self) {
        for entry in self.pending.iter() {
            entry.value().resolve(FetchOutcomeOrCancel::Cancelled);
        }
    }
}

async fn reader_loop(
    mut stdout: BufReader<tokio::process::ChildStdout>,
    pending: Arc<DashMap<String, Arc<Pending>>>,
    dead: Arc<AtomicBool>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match stdout.read_line(&mut line).await {
            Ok(0) | Err(_) => {
                dead.store(true, Ordering::Relaxed);
                for entry in pending.iter() {
                    entry.value().resolve(FetchOutcomeOrCancel::Cancelled);
                }
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match wire::parse_response_line(trimmed) {
                    Ok(parsed) => {
                        let url = parsed.url.clone();
                        if let Some((_, pending_entry)) = pending.remove(&url) {
                            pending_entry.resolve(FetchOutcomeOrCancel::Outcome(parsed.into()));
                        } else {
                            tracing::warn!(%url, "fetch response for an URL nobody is awaiting");
                        }
                    }
                    Err(error) => {
                        tracing::warn!(?error, line = %trimmed, "malformed fetch response line");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_resolves_all_waiters_on_cancel() {
        let pending = Arc::new(Pending::new());
        let waiter = Arc::clone(&pending);
        let handle = tokio::spawn(async move {
            let notified = waiter.notify.notified();
            if waiter.result.lock().unwrap().is_none() {
                notified.await;
            }
            waiter.result.lock().unwrap().clone()
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        pending.resolve(FetchOutcomeOrCancel::Cancelled);
        let result = handle.await.unwrap();
        assert!(matches!(result, Some(FetchOutcomeOrCancel::Cancelled)));
    }
}
