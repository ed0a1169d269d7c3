//! Manager binary entry point: loads configuration, connects storage,
//! builds `ManagerState`, and serves the HTTP surface (§6.1).

use anyhow::{Context, Result};
use crawlmesh::config;
use crawlmesh::manager::{http, ManagerState, SqliteStorage};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = config::load_manager_config().context("loading manager configuration")?;
    let storage = SqliteStorage::connect(&config.storage.dsn_or_url, config.storage.max_connections)
        .await
        .context("connecting to storage")?;

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(ManagerState::new(config, Arc::new(storage)));
    let router = http::router(state);

    tracing::info!(%bind_addr, "manager listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    axum::serve(listener, router).await.context("serving http")?;
    Ok(())
}
