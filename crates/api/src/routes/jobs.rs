//! Route definitions for the `/jobs` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{actions, jobs, uploads};
use crate::state::AppState;

/// Largest accepted manual upload.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// POST   /                -> create_job
/// POST   /actions         -> dispatch_action
/// POST   /bulk-delete     -> bulk_delete
/// GET    /{id}            -> get_job
/// PATCH  /{id}            -> update_job
/// DELETE /{id}            -> delete_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/actions", post(actions::dispatch_action))
        .route("/bulk-delete", post(jobs::bulk_delete))
        .route(
            "/{id}",
            get(jobs::get_job)
                .patch(jobs::update_job)
                .delete(jobs::delete_job),
        )
}

/// `POST /upload -> upload_video (multipart)`, mounted at `/jobs` apart
/// from [`router`] so it runs under the upload timeout instead of the
/// regular request timeout.
pub fn upload_router() -> Router<AppState> {
    Router::new().route(
        "/upload",
        post(uploads::upload_video).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
    )
}
