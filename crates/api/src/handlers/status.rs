//! Read-only dashboard projections under `/api/v1/status`.

use std::collections::BTreeMap;

use autotube_core::job_status::JobStatus;
use autotube_core::liveness::{infer_stage_liveness, JobActivitySample, StageLiveness};
use autotube_db::repositories::{HeartbeatRepo, JobRepo};
use axum::extract::State;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::extract::QueryParams;
use crate::response::{DataResponse, JobView};
use crate::state::AppState;

/// Cap on jobs returned by the recent-activity view.
const RECENT_LIMIT: i64 = 200;

/// Longest accepted `window_secs` (one day).
const MAX_WINDOW_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Serialize)]
pub struct StatusCounts {
    pub total: i64,
    /// Every status, including those with no jobs.
    pub counts: BTreeMap<&'static str, i64>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub window_secs: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct WorkersResponse {
    pub stages: Vec<StageLiveness>,
    pub window_secs: i64,
}

/// GET /api/v1/status/counts
pub async fn status_counts(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<StatusCounts>>> {
    let mut counts: BTreeMap<&'static str, i64> =
        JobStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();

    for row in JobRepo::status_counts(&state.pool).await? {
        match JobStatus::from_str_value(&row.status) {
            Ok(status) => {
                counts.insert(status.as_str(), row.count);
            }
            Err(e) => tracing::warn!(error = %e, "Skipping unknown status in counts"),
        }
    }

    Ok(Json(DataResponse {
        data: StatusCounts {
            total: counts.values().sum(),
            counts,
        },
    }))
}

/// GET /api/v1/status/in-flight
///
/// In-flight jobs keyed by status. Every in-flight status is present.
pub async fn in_flight(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<BTreeMap<&'static str, Vec<JobView>>>>> {
    let mut grouped: BTreeMap<&'static str, Vec<JobView>> = JobStatus::IN_FLIGHT
        .iter()
        .map(|s| (s.as_str(), Vec::new()))
        .collect();

    let now = Utc::now();
    let jobs = JobRepo::list_in_flight(&state.pool).await?;
    for view in JobView::many(jobs, now, state.config.stale_after_secs)? {
        if let Some(bucket) = grouped.get_mut(view.job.status.as_str()) {
            bucket.push(view);
        }
    }

    Ok(Json(DataResponse { data: grouped }))
}

/// GET /api/v1/status/recent?window_secs=
///
/// Jobs updated within the window, most recent first.
pub async fn recent(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<RecentQuery>,
) -> AppResult<Json<DataResponse<Vec<JobView>>>> {
    let window = params
        .window_secs
        .unwrap_or(state.config.recent_window_secs)
        .clamp(1, MAX_WINDOW_SECS);
    let now = Utc::now();

    let jobs =
        JobRepo::list_updated_since(&state.pool, now - Duration::seconds(window), RECENT_LIMIT)
            .await?;
    let data = JobView::many(jobs, now, state.config.stale_after_secs)?;
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/status/workers
///
/// Per-stage liveness from heartbeats, with the job-activity heuristic
/// reported alongside.
pub async fn workers(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<WorkersResponse>>> {
    let window = state.config.recent_window_secs;
    let now = Utc::now();

    let heartbeats: Vec<_> = HeartbeatRepo::list(&state.pool)
        .await?
        .iter()
        .filter_map(|hb| hb.to_sample())
        .collect();

    let activity: Vec<JobActivitySample> =
        JobRepo::list_activity(&state.pool, now - Duration::seconds(window))
            .await?
            .iter()
            .filter_map(|job| {
                Some(JobActivitySample {
                    status: job.job_status().ok()?,
                    sub_status: job.sub_status(),
                    sub_status_at: job.sub_status_at,
                })
            })
            .collect();

    Ok(Json(DataResponse {
        data: WorkersResponse {
            stages: infer_stage_liveness(&heartbeats, &activity, now, window),
            window_secs: window,
        },
    }))
}
