//! The dashboard app: routes, stored artifacts, and the HTTP middleware
//! stack. `main.rs` and the integration tests both build it through
//! [`build_app_router`].

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Health at the root, artifacts under `/storage/{bucket}/{job_id}/{file}`,
/// everything else under `/api/v1`.
///
/// Every route runs under `request_timeout_secs` except the manual upload,
/// which gets `upload_timeout_secs` to stream the video body.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let regular = Router::new()
        .merge(routes::health::router())
        .nest_service("/storage", ServeDir::new(&config.storage_root))
        .nest("/api/v1", routes::api_routes())
        .layer(timeout(config.request_timeout_secs));

    let uploads = Router::new()
        .nest("/api/v1/jobs", routes::jobs::upload_router())
        .layer(timeout(config.upload_timeout_secs));

    with_middleware(regular.merge(uploads), config).with_state(state)
}

fn timeout(secs: u64) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(secs))
}

/// Outermost first: CORS, request id, tracing, request id echo, panic
/// recovery. Timeouts are applied per route group in [`build_app_router`].
fn with_middleware(app: Router<AppState>, config: &ServerConfig) -> Router<AppState> {
    // Applied innermost first; each `Router::layer` call re-boxes the body.
    app.layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::new(REQUEST_ID))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
        .layer(dashboard_cors(&config.cors_origins))
}

/// CORS for the dashboard origins. Unparseable origins are skipped.
pub fn dashboard_cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|e| tracing::warn!(origin, error = %e, "Skipping bad CORS origin"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}
