//! Handlers for the `/jobs` resource.

use autotube_core::error::CoreError;
use autotube_core::job_status::JobStatus;
use autotube_core::storage::ArtifactStore;
use autotube_core::types::DbId;
use autotube_core::validation::{
    normalize_tags, validate_description, validate_job_ids, validate_title, validate_topic,
};
use autotube_db::models::job::{CreateJob, JobListQuery, UpdateJobFields};
use autotube_db::repositories::JobRepo;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::response::{DataResponse, JobView};
use crate::state::AppState;

/// Request body for `POST /api/v1/jobs/bulk-delete`.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(alias = "jobIds")]
    pub job_ids: Vec<DbId>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: usize,
    pub job_ids: Vec<DbId>,
}

fn job_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "Job", id })
}

/// Remove stored artifacts for deleted jobs. Failures are logged only.
pub(crate) async fn remove_artifacts(artifacts: &dyn ArtifactStore, job_ids: &[DbId]) {
    for &job_id in job_ids {
        match artifacts.delete_job_artifacts(job_id).await {
            Ok(removed) => {
                tracing::debug!(job_id, removed, "Removed job artifacts");
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Failed to remove job artifacts");
            }
        }
    }
}

/// GET /api/v1/jobs
///
/// List jobs newest first. Supports optional `status`, `limit`, and
/// `offset` query parameters.
pub async fn list_jobs(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    if let Some(status) = &params.status {
        JobStatus::from_str_value(status).map_err(CoreError::Validation)?;
    }
    let jobs = JobRepo::list(&state.pool, &params).await?;
    let data = JobView::many(jobs, Utc::now(), state.config.stale_after_secs)?;
    Ok(Json(DataResponse { data }))
}

/// POST /api/v1/jobs
///
/// Create an idle job from a topic. Returns 201 with the created job.
pub async fn create_job(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateJob>,
) -> AppResult<impl IntoResponse> {
    let topic = validate_topic(&input.topic)?;
    let job = JobRepo::create(&state.pool, &CreateJob { topic }).await?;

    tracing::info!(job_id = job.id, "Job created");

    let data = JobView::new(job, Utc::now(), state.config.stale_after_secs)?;
    Ok((StatusCode::CREATED, Json(DataResponse { data })))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    PathParam(job_id): PathParam<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = JobRepo::find_by_id(&state.pool, job_id)
        .await?
        .ok_or_else(|| job_not_found(job_id))?;
    let data = JobView::new(job, Utc::now(), state.config.stale_after_secs)?;
    Ok(Json(DataResponse { data }))
}

/// PATCH /api/v1/jobs/{id}
///
/// Update user-editable fields. Never changes the job's status or queued
/// action, so it can be used while a stage is in flight.
pub async fn update_job(
    State(state): State<AppState>,
    PathParam(job_id): PathParam<DbId>,
    JsonBody(mut input): JsonBody<UpdateJobFields>,
) -> AppResult<impl IntoResponse> {
    if input.is_empty() {
        return Err(AppError::BadRequest("No fields to update".into()));
    }
    if let Some(title) = &input.title {
        validate_title(title)?;
    }
    if let Some(description) = &input.description {
        validate_description(description)?;
    }
    if let Some(tags) = &input.tags {
        input.tags = Some(normalize_tags(tags)?);
    }

    let job = JobRepo::update_fields(&state.pool, job_id, &input)
        .await?
        .ok_or_else(|| job_not_found(job_id))?;

    tracing::info!(job_id, "Job fields updated");

    let data = JobView::new(job, Utc::now(), state.config.stale_after_secs)?;
    Ok(Json(DataResponse { data }))
}

/// DELETE /api/v1/jobs/{id}
///
/// Idempotent: returns 204 whether or not the job existed.
pub async fn delete_job(
    State(state): State<AppState>,
    PathParam(job_id): PathParam<DbId>,
) -> AppResult<StatusCode> {
    let deleted = JobRepo::delete_many(&state.pool, &[job_id]).await?;
    if !deleted.is_empty() {
        tracing::info!(job_id, "Job deleted");
    }
    // Artifacts may exist for a row that was never inserted (failed upload).
    remove_artifacts(state.artifacts.as_ref(), &[job_id]).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/jobs/bulk-delete
pub async fn bulk_delete(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<BulkDeleteRequest>,
) -> AppResult<impl IntoResponse> {
    let ids = validate_job_ids(&input.job_ids)?;
    let deleted = JobRepo::delete_many(&state.pool, &ids).await?;

    tracing::info!(requested = ids.len(), deleted = deleted.len(), "Jobs deleted");

    remove_artifacts(state.artifacts.as_ref(), &deleted).await;

    Ok(Json(DataResponse {
        data: BulkDeleteResponse {
            deleted: deleted.len(),
            job_ids: deleted,
        },
    }))
}
