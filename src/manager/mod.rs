//! §4.3 — the manager: owns URL state and serves workers over HTTP.

pub mod given_cache;
pub mod http;
pub mod prefetch;
pub mod report_queue;
pub mod state;
pub mod storage;

pub use state::ManagerState;
pub use storage::{SqliteStorage, Storage};
