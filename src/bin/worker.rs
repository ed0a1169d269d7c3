//! Worker binary entry point: loads configuration, spawns the fetch
//! subprocess, and runs the queue filler + dispatcher (§4.4) until
//! interrupted.

use anyhow::{Context, Result};
use crawlmesh::config;
use crawlmesh::worker::{fetch_queue::FetchQueue, host_limiter::HostLimiter, queue_filler};
use crawlmesh::worker::{Dispatcher, FetchClient, ManagerClient, RobotsCache};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = config::load_worker_config().context("loading worker configuration")?;
    let closed = Arc::new(AtomicBool::new(false));

    let fetch_client = Arc::new(
        FetchClient::spawn(&config.io_worker_path, Arc::clone(&closed))
            .await
            .context("spawning fetch subprocess")?,
    );
    let queue = Arc::new(FetchQueue::new(config.max_queue_size));
    let manager = Arc::new(ManagerClient::new(config.manager_url.clone(), config.api_key.clone()));
    let robots = Arc::new(RobotsCache::new(
        Arc::clone(&fetch_client),
        config.identity.user_agent.clone(),
    ));
    let host_limiter = Arc::new(HostLimiter::new(config.max_connections_per_host));

    let filler = tokio::spawn(queue_filler::run(
        Arc::clone(&queue),
        Arc::clone(&manager),
        config.max_queue_size,
        config.full_queue_pause(),
        Arc::clone(&closed),
    ));

    let dispatcher = Dispatcher::new(
        queue,
        manager,
        fetch_client,
        robots,
        host_limiter,
        Arc::clone(&closed),
        config.max_connections,
        config.socket_timeout(),
        config.identity.user_agent.clone(),
    );

    tracing::info!(manager_url = %config.manager_url, "worker started");

    tokio::select! {
        () = dispatcher.run(false) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested, draining in-flight fetches");
            dispatcher.graceful_stop(Some(std::time::Duration::from_secs(30))).await;
        }
    }

    filler.abort();
    Ok(())
}
