//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! instead of ad-hoc `serde_json::json!({ "data": ... })`.

use autotube_core::status_view::{derive_status, DerivedStatus};
use autotube_core::types::Timestamp;
use autotube_db::models::job::Job;
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// A job row plus the fields the dashboard derives from it.
#[derive(Debug, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    #[serde(flatten)]
    pub derived: DerivedStatus,
}

impl JobView {
    pub fn new(job: Job, now: Timestamp, stale_after_secs: i64) -> AppResult<Self> {
        let snapshot = job.snapshot().map_err(|e| {
            AppError::InternalError(format!("job {} has an unreadable state: {e}", job.id))
        })?;
        let derived = derive_status(
            &snapshot,
            job.sub_status(),
            job.updated_at,
            now,
            stale_after_secs,
        );
        Ok(Self { job, derived })
    }

    pub fn many(jobs: Vec<Job>, now: Timestamp, stale_after_secs: i64) -> AppResult<Vec<Self>> {
        jobs.into_iter()
            .map(|job| Self::new(job, now, stale_after_secs))
            .collect()
    }
}
