//! Action dispatch: `POST /api/v1/jobs/actions`.
//!
//! Validates the requested action against every job in the batch, then
//! records it with a compare-and-swap write. Nothing is executed here; the
//! stage runners pick queued jobs up.

use std::collections::HashMap;

use autotube_core::action::PipelineAction;
use autotube_core::error::CoreError;
use autotube_core::state_machine::{validate_batch, JobSnapshot};
use autotube_core::types::DbId;
use autotube_core::validation::validate_job_ids;
use autotube_db::models::job::Job;
use autotube_db::repositories::{JobRepo, QueueOutcome};
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extract::JsonBody;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(alias = "jobIds")]
    pub job_ids: Vec<DbId>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub message: String,
    pub queued: usize,
    pub job_ids: Vec<DbId>,
}

pub fn queued_message(action: PipelineAction, count: usize) -> String {
    let noun = if count == 1 { "job" } else { "jobs" };
    format!("Queued {action} for {count} {noun}")
}

/// POST /api/v1/jobs/actions
///
/// All-or-nothing: if any job is missing or refuses the action, no job is
/// changed and every offending job is reported.
pub async fn dispatch_action(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ActionRequest>,
) -> AppResult<Json<DataResponse<ActionResponse>>> {
    let action = PipelineAction::parse(&input.action)?;
    let ids = validate_job_ids(&input.job_ids)?;

    let mut by_id: HashMap<DbId, Job> = JobRepo::find_by_ids(&state.pool, &ids)
        .await?
        .into_iter()
        .map(|job| (job.id, job))
        .collect();

    let missing: Vec<DbId> = ids
        .iter()
        .copied()
        .filter(|id| !by_id.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(CoreError::JobsNotFound { ids: missing }.into());
    }

    let snapshots = ids
        .iter()
        .map(|id| {
            let job = &by_id[id];
            let snapshot: JobSnapshot = job.snapshot().map_err(|e| {
                AppError::InternalError(format!("job {id} has an unreadable state: {e}"))
            })?;
            Ok((*id, snapshot))
        })
        .collect::<AppResult<Vec<_>>>()?;

    let accepted = validate_batch(action, &snapshots).map_err(|rejection| {
        tracing::info!(
            action = %action,
            kind = rejection.kind.as_str(),
            rejected = rejection.rejections.len(),
            "Action request rejected",
        );
        AppError::Rejected(rejection)
    })?;

    let requests: Vec<_> = accepted
        .into_iter()
        .filter_map(|(id, pending)| by_id.remove(&id).map(|job| (job, pending)))
        .collect();

    match JobRepo::queue_actions(&state.pool, &requests).await? {
        QueueOutcome::Queued(jobs) => {
            let job_ids: Vec<DbId> = jobs.iter().map(|j| j.id).collect();
            tracing::info!(action = %action, queued = job_ids.len(), "Action queued");
            Ok(Json(DataResponse {
                data: ActionResponse {
                    message: queued_message(action, job_ids.len()),
                    queued: job_ids.len(),
                    job_ids,
                },
            }))
        }
        QueueOutcome::Conflict { job_id } => {
            tracing::warn!(action = %action, job_id, "Job changed during dispatch");
            Err(CoreError::Conflict(format!(
                "Job {job_id} changed concurrently, retry"
            ))
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_message_pluralizes() {
        assert_eq!(
            queued_message(PipelineAction::GenerateScript, 2),
            "Queued generate_script for 2 jobs"
        );
        assert_eq!(
            queued_message(PipelineAction::RunAll, 1),
            "Queued run_all for 1 job"
        );
    }
}
