//! Error taxonomy shared by the manager and worker binaries.
//!
//! Background loops catch and log these; per-URL processing in the worker
//! encodes `CrawlError` into a report's `result` string and continues.
//! `IoWorkerDead` is the one variant that is fatal to a running worker.

use thiserror::Error;

/// Missing or wrongly-typed configuration option. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("option \"{0}\" is not defined in config")]
    MissingOption(String),

    #[error("config option \"{option}\" has wrong value \"{value}\": {expected} expected")]
    WrongOption {
        option: String,
        value: String,
        expected: String,
    },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A non-2xx response, either from the manager to a worker or vice versa.
/// Recoverable by retry in background loops; fatal to whatever single
/// request triggered it.
#[derive(Debug, Error)]
#[error("api error: status {status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Errors encountered while crawling a single URL. These are recorded into
/// a `Report::result` string, never propagated past `process()`.
#[derive(Debug, Error, Clone)]
pub enum CrawlError {
    #[error("{0}")]
    Fetch(String),

    #[error("{0}")]
    Robots(String),
}

/// Wraps the storage backend's own errors. Surfaced to the manager's
/// flusher, which logs and retries on its next tick.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error("storage conflict updating {url}")]
    Conflict { url: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The fetch subprocess died (its pipe closed). Fatal to the worker process.
#[derive(Debug, Error)]
#[error("io-worker subprocess is dead")]
pub struct IoWorkerDead;
