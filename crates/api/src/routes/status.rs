//! Route definitions for the read-only `/status` projections.

use axum::routing::get;
use axum::Router;

use crate::handlers::status;
use crate::state::AppState;

/// Routes mounted at `/status`.
///
/// ```text
/// GET    /counts          -> status_counts
/// GET    /in-flight       -> in_flight
/// GET    /recent          -> recent
/// GET    /workers         -> workers
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/counts", get(status::status_counts))
        .route("/in-flight", get(status::in_flight))
        .route("/recent", get(status::recent))
        .route("/workers", get(status::workers))
}
