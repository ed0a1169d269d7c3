//! Configuration surface. A flat `#[derive(Serialize, Deserialize)]` struct
//! with a hand-written `Default` impl per service, rather than a builder
//! for a handful of flat numeric knobs.
//!
//! Loaded from a YAML file named by the `CRAWLMESH_CONFIG_PATH`
//! environment variable, with a handful of secrets (the manager's
//! authorized keys, the worker's api key) overridable from the environment
//! directly so they need not be committed to a config file on disk.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "CRAWLMESH_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    pub queue_size: usize,
    pub get_timeout_ms: u64,
    pub single_limit: usize,
    pub cache_timeout_secs: u64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            queue_size: 1000,
            get_timeout_ms: 10,
            single_limit: 200,
            cache_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostReportConfig {
    pub queue_size: usize,
    pub flush_size: usize,
    pub flush_delay_ms: u64,
}

impl Default for PostReportConfig {
    fn default() -> Self {
        Self {
            queue_size: 1000,
            flush_size: 50,
            flush_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub max_connections: u32,
    pub dsn_or_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_connections: 8,
            dsn_or_url: "sqlite://crawlmesh.sqlite".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub max_queue_limit: usize,
    pub min_revisit_minutes: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_queue_limit: 1000,
            min_revisit_minutes: 360,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub name: String,
    pub user_agent: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: "crawlmesh".to_string(),
            user_agent: "crawlmesh/0.1 (+https://example.invalid/bot)".to_string(),
        }
    }
}

/// The manager's configuration surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub bind_addr: String,
    pub prefetch: PrefetchConfig,
    pub postreport: PostReportConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub authorized_keys: HashSet<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            prefetch: PrefetchConfig::default(),
            postreport: PostReportConfig::default(),
            storage: StorageConfig::default(),
            api: ApiConfig::default(),
            authorized_keys: HashSet::new(),
        }
    }
}

impl ManagerConfig {
    #[must_use]
    pub fn prefetch_get_timeout(&self) -> Duration {
        Duration::from_millis(self.prefetch.get_timeout_ms)
    }

    #[must_use]
    pub fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.prefetch.cache_timeout_secs)
    }

    #[must_use]
    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.postreport.flush_delay_ms)
    }
}

/// The worker's configuration surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub manager_url: String,
    pub api_key: String,
    pub identity: IdentityConfig,
    pub max_queue_size: usize,
    pub max_connections: usize,
    pub max_connections_per_host: usize,
    pub socket_timeout_secs: u64,
    pub full_queue_pause_secs: u64,
    pub io_worker_path: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            manager_url: "http://127.0.0.1:8000".to_string(),
            api_key: String::new(),
            identity: IdentityConfig::default(),
            max_queue_size: 200,
            max_connections: 50,
            max_connections_per_host: 5,
            socket_timeout_secs: 30,
            full_queue_pause_secs: 1,
            io_worker_path: "io-worker".to_string(),
        }
    }
}

impl WorkerConfig {
    #[must_use]
    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout_secs)
    }

    #[must_use]
    pub fn full_queue_pause(&self) -> Duration {
        Duration::from_secs(self.full_queue_pause_secs)
    }
}

fn load<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Loads configuration from the file named by `CRAWLMESH_CONFIG_PATH`, or
/// falls back to defaults if the variable is unset (mirroring the original
/// implementation's "dummy"/"stub" escape hatch for tests, simplified to
/// "absent is default").
pub fn load_manager_config() -> Result<ManagerConfig, ConfigError> {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => load(Path::new(&path)),
        Err(_) => Ok(ManagerConfig::default()),
    }
}

pub fn load_worker_config() -> Result<WorkerConfig, ConfigError> {
    let mut config: WorkerConfig = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => load(Path::new(&path))?,
        Err(_) => WorkerConfig::default(),
    };
    if let Ok(key) = std::env::var("CRAWLMESH_API_KEY") {
        config.api_key = key;
    }
    if let Ok(url) = std::env::var("CRAWLMESH_MANAGER_URL") {
        config.manager_url = url;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_defaults_cap_queue_limit_at_1000() {
        assert_eq!(ManagerConfig::default().api.max_queue_limit, 1000);
    }

    #[test]
    fn worker_defaults_cap_per_host_at_5() {
        assert_eq!(WorkerConfig::default().max_connections_per_host, 5);
    }
}
