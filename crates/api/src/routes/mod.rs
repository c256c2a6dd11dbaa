pub mod health;
pub mod jobs;
pub mod status;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                      WebSocket change feed
///
/// /jobs                    list, create
/// /jobs/actions            request an action for a batch of jobs
/// /jobs/upload             create a job from an uploaded video
/// /jobs/bulk-delete        delete many
/// /jobs/{id}               get, update fields, delete
///
/// /status/counts           jobs per status
/// /status/in-flight        in-flight jobs grouped by status
/// /status/recent           recently updated jobs
/// /status/workers          per-stage worker liveness
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/jobs", jobs::router())
        .nest("/status", status::router())
}
