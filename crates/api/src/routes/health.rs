use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    /// `ok`, or `degraded` when Postgres is unreachable.
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    /// Dashboard sockets on the job change feed.
    pub feed_subscribers: usize,
}

/// `GET /health`. Always 200; a dead database shows up as `degraded`.
async fn health(State(state): State<AppState>) -> Json<Health> {
    let database = autotube_db::health_check(&state.pool).await.is_ok();
    Json(Health {
        status: if database { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        feed_subscribers: state.subscribers.len().await,
    })
}

/// Mounted at the root, outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
