#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use autotube_api::config::ServerConfig;
use autotube_api::router::build_app_router;
use autotube_api::state::AppState;
use autotube_api::ws::Subscribers;
use autotube_core::liveness::{DEFAULT_RECENT_WINDOW_SECS, DEFAULT_STALE_AFTER_SECS};
use autotube_core::storage::LocalArtifactStore;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

pub const TEST_PUBLIC_BASE_URL: &str = "http://localhost:3000/storage";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(storage_root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: String::new(),
        db_max_connections: 5,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        upload_timeout_secs: 600,
        storage_root: storage_root.to_path_buf(),
        public_base_url: TEST_PUBLIC_BASE_URL.to_string(),
        stale_after_secs: DEFAULT_STALE_AFTER_SECS,
        recent_window_secs: DEFAULT_RECENT_WINDOW_SECS,
    }
}

/// Build the full application router, with the production middleware stack,
/// over `pool` and a filesystem artifact store rooted at `storage_root`.
pub fn build_test_app_with_storage(pool: PgPool, storage_root: &Path) -> Router {
    build_test_app_with_config(pool, test_config(storage_root))
}

/// Like [`build_test_app_with_storage`] with a caller-tuned config.
pub fn build_test_app_with_config(pool: PgPool, config: ServerConfig) -> Router {
    let storage_root = config.storage_root.clone();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        subscribers: Arc::new(Subscribers::new()),
        artifacts: Arc::new(LocalArtifactStore::new(storage_root, TEST_PUBLIC_BASE_URL)),
    };
    build_app_router(state, &config)
}

/// Build the application with a throwaway storage root that is never
/// created unless something is stored.
pub fn build_test_app(pool: PgPool) -> Router {
    let root = std::env::temp_dir().join(format!("autotube-test-{}", uuid::Uuid::new_v4()));
    build_test_app_with_storage(pool, &root)
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn send_json(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send_json(app, Method::POST, uri, body).await
}

pub async fn patch_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send_json(app, Method::PATCH, uri, body).await
}

/// POST a body verbatim, for requests that are not valid JSON.
pub async fn post_raw(app: Router, uri: &str, content_type: &str, body: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        bytes: &'a [u8],
    },
}

const BOUNDARY: &str = "autotube-test-boundary";

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// Encode `parts` as a `multipart/form-data` body.
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body: Vec<u8> = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                name,
                filename,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", multipart_content_type())
            .body(Body::from(multipart_body(parts)))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Create a job through the API and return its id.
pub async fn create_job(pool: &PgPool, topic: &str) -> i64 {
    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/jobs",
        serde_json::json!({ "topic": topic }),
    )
    .await;
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

/// Request `action` for `job_ids` through the API.
pub async fn dispatch(pool: &PgPool, action: &str, job_ids: &[i64]) -> Response<Body> {
    post_json(
        build_test_app(pool.clone()),
        "/api/v1/jobs/actions",
        serde_json::json!({ "action": action, "job_ids": job_ids }),
    )
    .await
}

/// A body that sends the first half of `bytes` at once and the rest after
/// `pause`, like a client on a slow link.
pub fn trickle_body(bytes: Vec<u8>, pause: std::time::Duration) -> Body {
    use futures::StreamExt;

    let tail = axum::body::Bytes::from(bytes);
    let head = tail.slice(..tail.len() / 2);
    let tail = tail.slice(tail.len() / 2..);
    let chunks = futures::stream::iter([(head, std::time::Duration::ZERO), (tail, pause)]).then(
        |(chunk, delay)| async move {
            tokio::time::sleep(delay).await;
            Ok::<_, std::io::Error>(chunk)
        },
    );
    Body::from_stream(chunks)
}

/// POST `body` with an explicit content type.
pub async fn post_body(app: Router, uri: &str, content_type: &str, body: Body) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", content_type)
            .body(body)
            .unwrap(),
    )
    .await
    .unwrap()
}
