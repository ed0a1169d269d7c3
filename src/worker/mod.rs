//! §4.4 — the worker: a long-running fetch-scheduling process.

pub mod dispatcher;
pub mod fetch_client;
pub mod fetch_queue;
pub mod host_limiter;
pub mod link_extractor;
pub mod manager_client;
pub mod queue_filler;
pub mod robots;

pub use dispatcher::Dispatcher;
pub use fetch_client::FetchClient;
pub use fetch_queue::FetchQueue;
pub use manager_client::ManagerClient;
pub use robots::RobotsCache;
