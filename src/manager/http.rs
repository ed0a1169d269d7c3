//! §6.1 — the manager's HTTP surface: `POST /crawl-queue`, `PUT /report`,
//! auth-header check, ETag, and conditional gzip, layered over axum the way
//! `edb-rs-edb`'s `rpc-proxy` crate layers `tower`/`tower-http` over its own
//! router.

use crate::manager::state::ManagerState;
use crate::model::Report;
use axum::body::{Body, Bytes};
use axum::extract::{Form, State};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{post, put};
use axum::{Json, Router};
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const AUTH_HEADER: &str = "x-heroshi-auth";
const GZIP_THRESHOLD: usize = 400;

#[must_use]
pub fn router(state: Arc<ManagerState>) -> Router {
    Router::new()
        .route("/crawl-queue", post(crawl_queue))
        .route("/report", put(report))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_and_encode,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

#[derive(Debug, Deserialize)]
struct CrawlQueueRequest {
    limit: usize,
}

async fn crawl_queue(
    State(state): State<Arc<ManagerState>>,
    Form(req): Form<CrawlQueueRequest>,
) -> Json<Vec<crate::model::QueueItem>> {
    state.mark_active();
    let limit = req.limit.min(state.config.api.max_queue_limit);
    let items = state.prefetch.take(limit).await;
    Json(items)
}

async fn report(State(state): State<Arc<ManagerState>>, Json(report): Json<Report>) -> StatusCode {
    state.mark_active();
    state.reports.accept(report).await;
    StatusCode::OK
}

/// Single middleware layer doing three things §6.1 asks for: shared-secret
/// auth rejection, a SHA-256 `ETag` on every response, and conditional gzip
/// when the client advertises support and the body is worth compressing.
async fn auth_and_encode(
    State(state): State<Arc<ManagerState>>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !state.config.authorized_keys.contains(key) {
        return Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .body(Body::empty())
            .expect("static response is valid");
    }

    let path = request.uri().path().to_string();
    let wants_gzip = headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"));

    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    let etag = compute_etag(&path, &body_bytes);
    parts
        .headers
        .insert(header::ETAG, etag.parse().expect("base64 is valid header value"));

    if wants_gzip && body_bytes.len() > GZIP_THRESHOLD {
        if let Ok(compressed) = gzip_encode(&body_bytes) {
            parts
                .headers
                .insert(header::CONTENT_ENCODING, "gzip".parse().expect("valid header value"));
            parts
                .headers
                .insert(header::CONTENT_LENGTH, compressed.len().into());
            return Response::from_parts(parts, Body::from(compressed));
        }
    }

    parts
        .headers
        .insert(header::CONTENT_LENGTH, body_bytes.len().into());
    Response::from_parts(parts, Body::from(body_bytes))
}

fn compute_etag(path: &str, body: &Bytes) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(body);
    let digest = hasher.finalize();
    format!("\"{}\"", base64::engine::general_purpose::STANDARD.encode(digest))
}

fn gzip_encode(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}
