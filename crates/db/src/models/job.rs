//! Video job entity model and DTOs.

use autotube_core::action::PendingAction;
use autotube_core::job_status::JobStatus;
use autotube_core::state_machine::{text_present, JobArtifacts, JobSnapshot};
use autotube_core::sub_status::SubStatus;
use autotube_core::types::{DbId, Timestamp};
use autotube_core::validation::PrivacyStatus;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `video_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub topic: String,
    pub status: String,
    pub script: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub voiceover_url: Option<String>,
    pub video_url: Option<String>,
    pub youtube_url: Option<String>,
    pub youtube_video_id: Option<String>,
    pub error_message: Option<String>,
    pub action_needed: Option<String>,
    pub run_all_stage: Option<String>,
    pub sub_status: Option<String>,
    pub sub_status_at: Option<Timestamp>,
    pub manual_upload: bool,
    pub privacy_status: String,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    pub fn job_status(&self) -> Result<JobStatus, String> {
        JobStatus::from_str_value(&self.status)
    }

    pub fn pending_action(&self) -> Result<Option<PendingAction>, String> {
        PendingAction::from_columns(self.action_needed.as_deref(), self.run_all_stage.as_deref())
    }

    /// The recorded sub-status. Unknown values read as `None`.
    pub fn sub_status(&self) -> Option<SubStatus> {
        self.sub_status
            .as_deref()
            .and_then(|s| SubStatus::from_str_value(s).ok())
    }

    pub fn privacy(&self) -> PrivacyStatus {
        PrivacyStatus::from_str_value(&self.privacy_status).unwrap_or_default()
    }

    /// Which dependency fields and stage outputs this job has.
    pub fn artifacts(&self) -> JobArtifacts {
        JobArtifacts {
            topic: text_present(Some(&self.topic)),
            script: text_present(self.script.as_deref()),
            title: text_present(self.title.as_deref()),
            description: self.description.is_some(),
            voiceover_url: text_present(self.voiceover_url.as_deref()),
            video_url: text_present(self.video_url.as_deref()),
            youtube_url: text_present(self.youtube_url.as_deref()),
        }
    }

    /// The state-machine view of this row.
    pub fn snapshot(&self) -> Result<JobSnapshot, String> {
        Ok(JobSnapshot {
            status: self.job_status()?,
            pending_action: self.pending_action()?,
            artifacts: self.artifacts(),
            manual_upload: self.manual_upload,
        })
    }
}

/// DTO for `POST /api/v1/jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJob {
    pub topic: String,
}

/// A job seeded from a manually uploaded video.
#[derive(Debug, Clone)]
pub struct CreateManualUploadJob {
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub privacy_status: PrivacyStatus,
    pub video_url: String,
}

/// DTO for `PATCH /api/v1/jobs/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateJobFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub script: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl UpdateJobFields {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.script.is_none()
            && self.tags.is_none()
    }
}

/// Outputs a stage writes on success. `None` leaves a column unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutputs {
    pub script: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub voiceover_url: Option<String>,
    pub video_url: Option<String>,
    pub youtube_url: Option<String>,
    pub youtube_video_id: Option<String>,
}

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    /// Filter by status string.
    pub status: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 200.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

/// One row of the per-status count query.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}
