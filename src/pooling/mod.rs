//! Shared pooling primitives used by both the manager and the worker: a
//! time-expiring cache and a map of bounded resource pools.

pub mod cache;
pub mod pool_map;

pub use cache::Cache;
pub use pool_map::{PoolGuard, PoolMap};
