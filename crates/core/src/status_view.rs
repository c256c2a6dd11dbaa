//! Read-only projection of a job's state for the dashboard.

use serde::Serialize;

use crate::action::{PendingAction, PipelineAction, Stage};
use crate::job_status::JobStatus;
use crate::liveness::is_possibly_stuck;
use crate::state_machine::{next_action, JobSnapshot};
use crate::sub_status::SubStatus;
use crate::types::Timestamp;

/// Fields derived from a job row, attached to every job the API returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedStatus {
    /// The one action the dashboard offers, from which artifacts exist.
    pub next_action: Option<PipelineAction>,
    pub in_flight: bool,
    /// Wire name of the queued action on a pending job.
    pub queued_action: Option<PipelineAction>,
    /// Stage the queued action will run next.
    pub queued_stage: Option<Stage>,
    /// In flight with no update for longer than the stale threshold.
    pub possibly_stuck: bool,
    pub label: String,
}

/// Human label for a stage while it runs.
pub fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Script => "Generating script",
        Stage::Voiceover => "Creating voiceover",
        Stage::Video => "Rendering video",
        Stage::Upload => "Uploading to YouTube",
    }
}

pub fn derive_status(
    job: &JobSnapshot,
    sub_status: Option<SubStatus>,
    updated_at: Timestamp,
    now: Timestamp,
    stale_after_secs: i64,
) -> DerivedStatus {
    let queued = match job.status {
        JobStatus::Pending => job.pending_action,
        _ => None,
    };

    DerivedStatus {
        next_action: next_action(job),
        in_flight: job.status.is_in_flight(),
        queued_action: queued.map(|p| p.action()),
        queued_stage: queued.map(|p| p.stage()),
        possibly_stuck: is_possibly_stuck(job.status, updated_at, now, stale_after_secs),
        label: status_label(job.status, queued, sub_status),
    }
}

fn status_label(
    status: JobStatus,
    queued: Option<PendingAction>,
    sub_status: Option<SubStatus>,
) -> String {
    if let Some(stage) = status.stage() {
        return match sub_status.filter(|s| s.stage() == stage) {
            Some(sub) => format!("{} ({sub})", stage_label(stage)),
            None => stage_label(stage).to_string(),
        };
    }
    match (status, queued) {
        (JobStatus::Pending, Some(PendingAction::Stage { stage })) => {
            format!("Queued: {}", stage.action())
        }
        (JobStatus::Pending, Some(PendingAction::RunAll { next })) => {
            format!("Queued: run_all (next: {next})")
        }
        (JobStatus::Pending, None) => "Idle".to_string(),
        (JobStatus::Completed, _) => "Completed".to_string(),
        _ => "Failed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::state_machine::JobArtifacts;

    fn job(status: JobStatus, pending_action: Option<PendingAction>) -> JobSnapshot {
        JobSnapshot {
            status,
            pending_action,
            artifacts: JobArtifacts {
                topic: true,
                ..Default::default()
            },
            manual_upload: false,
        }
    }

    fn derive(job: &JobSnapshot, sub: Option<SubStatus>) -> DerivedStatus {
        let now = Utc::now();
        derive_status(job, sub, now, now, 900)
    }

    #[test]
    fn idle_job_offers_script_generation() {
        let view = derive(&job(JobStatus::Pending, None), None);
        assert_eq!(view.next_action, Some(PipelineAction::GenerateScript));
        assert_eq!(view.label, "Idle");
        assert!(!view.in_flight);
    }

    #[test]
    fn queued_run_all_reports_chain_position() {
        let view = derive(
            &job(JobStatus::Pending, Some(PendingAction::RunAll { next: Stage::Video })),
            None,
        );
        assert_eq!(view.queued_action, Some(PipelineAction::RunAll));
        assert_eq!(view.queued_stage, Some(Stage::Video));
        assert_eq!(view.label, "Queued: run_all (next: video)");
    }

    #[test]
    fn in_flight_label_includes_matching_sub_status() {
        let running = job(JobStatus::CreatingVoiceover, None);
        assert_eq!(
            derive(&running, Some(SubStatus::GeneratingAudio)).label,
            "Creating voiceover (generating_audio)"
        );
        // A leftover marker from another stage is not shown.
        assert_eq!(
            derive(&running, Some(SubStatus::UploadingScript)).label,
            "Creating voiceover"
        );
    }

    #[test]
    fn stale_pending_action_on_failed_job_is_not_queued() {
        let failed = job(
            JobStatus::Failed,
            Some(PendingAction::Stage {
                stage: Stage::Upload,
            }),
        );
        let view = derive(&failed, None);
        assert_eq!(view.queued_action, None);
        assert_eq!(view.label, "Failed");
    }

    #[test]
    fn long_silent_in_flight_job_is_flagged() {
        let now = Utc::now();
        let view = derive_status(
            &job(JobStatus::Uploading, None),
            None,
            now - Duration::minutes(30),
            now,
            900,
        );
        assert!(view.possibly_stuck);
    }
}
