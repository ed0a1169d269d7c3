//! §8 end-to-end scenarios 1-3: empty-queue dispense, fresh dispense plus
//! report round trip, and the re-visit floor, driven against the manager's
//! real HTTP surface (a bound `TcpListener` + `reqwest`, not a mock router)
//! so the auth/ETag/gzip middleware is exercised along the way.

mod common;

use common::StubStorage;
use crawlmesh::config::ManagerConfig;
use crawlmesh::manager::{http, ManagerState};
use crawlmesh::model::{QueueItem, UrlRecord};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const API_KEY: &str = "test-key";

async fn spawn_manager(
    storage: StubStorage,
    config_overrides: impl FnOnce(&mut ManagerConfig),
) -> (String, Arc<StubStorage>) {
    let mut config = ManagerConfig::default();
    config.authorized_keys = HashSet::from([API_KEY.to_string()]);
    config.prefetch.get_timeout_ms = 80;
    config_overrides(&mut config);

    let storage = Arc::new(storage);
    let state = Arc::new(ManagerState::new(config, Arc::clone(&storage) as Arc<dyn crawlmesh::manager::Storage>));
    let router = http::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}"), storage)
}

#[tokio::test]
async fn empty_queue_dispense_returns_empty_array() {
    let (base_url, _storage) = spawn_manager(StubStorage::new(vec![]), |_| {}).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base_url}/crawl-queue"))
        .header("X-Heroshi-Auth", API_KEY)
        .form(&[("limit", "10")])
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    let items: Vec<QueueItem> = response.json().await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn fresh_dispense_then_report_round_trip_flushes_to_storage() {
    let storage = StubStorage::new(vec![vec![
        UrlRecord::stub("http://a/", None),
        UrlRecord::stub("http://b/", None),
        UrlRecord::stub("http://c/", None),
    ]]);
    let (base_url, storage) = spawn_manager(storage, |c| {
        c.postreport.flush_size = 1;
        c.postreport.flush_delay_ms = 20;
    })
    .await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base_url}/crawl-queue"))
        .header("X-Heroshi-Auth", API_KEY)
        .form(&[("limit", "10")])
        .send()
        .await
        .unwrap();
    let items: Vec<QueueItem> = response.json().await.unwrap();
    let mut urls: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
    urls.sort_unstable();
    assert_eq!(urls, vec!["http://a/", "http://b/", "http://c/"]);

    let report = serde_json::json!({
        "url": "http://a/",
        "result": "OK",
        "status_code": 200,
        "visited": "2024-01-01T00:00:00",
        "content": [120],
    });
    let response = client
        .put(format!("{base_url}/report"))
        .header("X-Heroshi-Auth", API_KEY)
        .json(&report)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    tokio::time::sleep(Duration::from_millis(300)).await;

    let updates = storage.updates.lock().await;
    let flushed = updates
        .iter()
        .find(|r| r.url == "http://a/")
        .expect("storage.update must have been called with the reported record");
    assert_eq!(flushed.result.as_deref(), Some("OK"));
    assert_eq!(flushed.status_code, Some(200));
    drop(updates);

    let saved_content = storage.saved_content.lock().await;
    assert_eq!(saved_content.len(), 1);
    assert_eq!(saved_content[0].0, "http://a/");
    assert_eq!(saved_content[0].1, vec![120]);
}

#[tokio::test]
async fn revisit_floor_excludes_recently_visited_urls() {
    let mut recent = UrlRecord::stub("http://d/", None);
    recent.visited = Some("2024-01-01T00:00:00".to_string());
    let storage = StubStorage::new(vec![vec![recent]]);
    let (base_url, _storage) = spawn_manager(storage, |c| {
        c.api.min_revisit_minutes = 60;
    })
    .await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base_url}/crawl-queue"))
        .header("X-Heroshi-Auth", API_KEY)
        .form(&[("limit", "10")])
        .send()
        .await
        .unwrap();
    let items: Vec<QueueItem> = response.json().await.unwrap();
    assert!(
        items.iter().all(|i| i.url != "http://d/"),
        "recently visited URL must not be dispensed"
    );
}

#[tokio::test]
async fn unauthorized_requests_are_rejected() {
    let (base_url, _storage) = spawn_manager(StubStorage::new(vec![]), |_| {}).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base_url}/crawl-queue"))
        .header("X-Heroshi-Auth", "wrong-key")
        .form(&[("limit", "10")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_path_is_404() {
    let (base_url, _storage) = spawn_manager(StubStorage::new(vec![]), |_| {}).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base_url}/nonexistent"))
        .header("X-Heroshi-Auth", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn crawl_queue_limit_is_capped_at_max_queue_limit() {
    let many: Vec<UrlRecord> = (0..20)
        .map(|i| UrlRecord::stub(format!("http://host/{i}"), None))
        .collect();
    let storage = StubStorage::new(vec![many]);
    let (base_url, _storage) = spawn_manager(storage, |c| {
        c.api.max_queue_limit = 5;
    })
    .await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base_url}/crawl-queue"))
        .header("X-Heroshi-Auth", API_KEY)
        .form(&[("limit", "20")])
        .send()
        .await
        .unwrap();
    let items: Vec<QueueItem> = response.json().await.unwrap();
    assert_eq!(items.len(), 5, "limit must be capped at api.max_queue_limit");
}
