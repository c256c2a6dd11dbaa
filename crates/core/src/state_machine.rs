//! Job state machine: action-request validation, dependency gating, and
//! stage transitions.
//!
//! Consumed by the API (what to accept and queue) and by the worker (what
//! to claim, and where a job goes after a stage finishes). All functions
//! here are pure; the caller loads the job, asks for a decision, and writes
//! the result with a conditional update.

use serde::Serialize;

use crate::action::{PendingAction, PipelineAction, Stage};
use crate::job_status::JobStatus;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Artifacts and dependencies
// ---------------------------------------------------------------------------

/// Whether a text column counts as present for dependency checks.
///
/// `None`, empty, and whitespace-only values are absent.
pub fn text_present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Which inputs and outputs a job currently has.
///
/// Built from the job row by the caller. `description` is present whenever
/// the column is non-null, even if it holds `""`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobArtifacts {
    pub topic: bool,
    pub script: bool,
    pub title: bool,
    pub description: bool,
    pub voiceover_url: bool,
    pub video_url: bool,
    pub youtube_url: bool,
}

impl JobArtifacts {
    pub fn has(&self, field: DependencyField) -> bool {
        match field {
            DependencyField::Topic => self.topic,
            DependencyField::Script => self.script,
            DependencyField::Title => self.title,
            DependencyField::Description => self.description,
            DependencyField::VoiceoverUrl => self.voiceover_url,
            DependencyField::VideoUrl => self.video_url,
        }
    }

    /// Whether the stage's primary output exists.
    pub fn stage_done(&self, stage: Stage) -> bool {
        match stage {
            Stage::Script => self.script,
            Stage::Voiceover => self.voiceover_url,
            Stage::Video => self.video_url,
            Stage::Upload => self.youtube_url,
        }
    }

    /// The artifacts after `stage` has written its outputs.
    pub fn with_stage_output(mut self, stage: Stage) -> Self {
        match stage {
            Stage::Script => {
                self.script = true;
                self.title = true;
                self.description = true;
            }
            Stage::Voiceover => self.voiceover_url = true,
            Stage::Video => self.video_url = true,
            Stage::Upload => self.youtube_url = true,
        }
        self
    }
}

/// A job field an action depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyField {
    Topic,
    Script,
    Title,
    Description,
    VoiceoverUrl,
    VideoUrl,
}

impl DependencyField {
    /// Column name, used by the dashboard to highlight cells.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Script => "script",
            Self::Title => "title",
            Self::Description => "description",
            Self::VoiceoverUrl => "voiceover_url",
            Self::VideoUrl => "video_url",
        }
    }
}

/// Fields that must be present before `action` may be queued.
///
/// `run_all` only needs a topic: later inputs are produced along the chain.
pub fn required_fields(action: PipelineAction) -> &'static [DependencyField] {
    use DependencyField::*;
    match action {
        PipelineAction::GenerateScript => &[Topic],
        PipelineAction::GenerateVoiceover => &[Script],
        PipelineAction::CreateVideo => &[Script, VoiceoverUrl],
        PipelineAction::PostToYoutube => &[Title, Description, VideoUrl],
        PipelineAction::RunAll => &[Topic],
    }
}

/// The required fields of `action` that `artifacts` lacks, in declaration
/// order.
pub fn missing_dependencies(
    action: PipelineAction,
    artifacts: &JobArtifacts,
) -> Vec<DependencyField> {
    required_fields(action)
        .iter()
        .copied()
        .filter(|field| !artifacts.has(*field))
        .collect()
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The parts of a job the state machine looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub pending_action: Option<PendingAction>,
    pub artifacts: JobArtifacts,
    /// Seeded from an uploaded video: only the upload stage applies.
    pub manual_upload: bool,
}

impl JobSnapshot {
    /// Stages this job may run, in pipeline order.
    pub fn eligible_stages(&self) -> &'static [Stage] {
        if self.manual_upload {
            &[Stage::Upload]
        } else {
            &Stage::ALL
        }
    }

    pub fn is_eligible(&self, stage: Stage) -> bool {
        self.eligible_stages().contains(&stage)
    }

    /// First eligible stage whose output does not exist yet.
    pub fn first_missing_stage(&self) -> Option<Stage> {
        self.eligible_stages()
            .iter()
            .copied()
            .find(|s| !self.artifacts.stage_done(*s))
    }
}

// ---------------------------------------------------------------------------
// Derived next action
// ---------------------------------------------------------------------------

/// First stage after `stage` whose output does not exist yet.
pub fn next_missing_stage_after(stage: Stage, artifacts: &JobArtifacts) -> Option<Stage> {
    stage.following().find(|s| !artifacts.stage_done(*s))
}

/// The single action the dashboard surfaces for a job.
///
/// Depends only on which artifacts exist and which stages the job may run,
/// never on the queued action. `None` means the job is fully complete.
pub fn next_action(job: &JobSnapshot) -> Option<PipelineAction> {
    job.first_missing_stage().map(|s| s.action())
}

// ---------------------------------------------------------------------------
// Action-request validation
// ---------------------------------------------------------------------------

/// Why an action request was refused. Ordered by check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    AlreadyProcessing,
    AlreadyQueued,
    MissingDependency,
    StageNotApplicable,
    AlreadyComplete,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyProcessing => "already_processing",
            Self::AlreadyQueued => "already_queued",
            Self::MissingDependency => "missing_dependency",
            Self::StageNotApplicable => "stage_not_applicable",
            Self::AlreadyComplete => "already_complete",
        }
    }
}

/// A refused action request for one job. Nothing is written when a request
/// is refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRejection {
    /// The job is in flight, or a `run_all` would collide with a chain (or
    /// later-stage request) that is already queued.
    AlreadyProcessing {
        status: JobStatus,
        pending: Option<PendingAction>,
    },
    /// The same action is already queued on a pending job.
    AlreadyQueued { action: PipelineAction },
    /// Required fields are absent.
    MissingDependencies { missing: Vec<DependencyField> },
    /// The action runs a stage this job never goes through (a pipeline
    /// stage on a manually uploaded video).
    StageNotApplicable { action: PipelineAction },
    /// `run_all` was requested but every stage output already exists.
    AlreadyComplete,
}

impl ActionRejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::AlreadyProcessing { .. } => RejectionKind::AlreadyProcessing,
            Self::AlreadyQueued { .. } => RejectionKind::AlreadyQueued,
            Self::MissingDependencies { .. } => RejectionKind::MissingDependency,
            Self::StageNotApplicable { .. } => RejectionKind::StageNotApplicable,
            Self::AlreadyComplete => RejectionKind::AlreadyComplete,
        }
    }

    /// Missing field names, for dependency rejections.
    pub fn missing_fields(&self) -> Option<Vec<&'static str>> {
        match self {
            Self::MissingDependencies { missing } => {
                Some(missing.iter().map(DependencyField::as_str).collect())
            }
            _ => None,
        }
    }

    /// Human-readable explanation, without the job id.
    pub fn reason(&self) -> String {
        match self {
            Self::AlreadyProcessing { status, pending } => match (status.is_in_flight(), pending) {
                (true, _) | (false, None) => format!("already processing ({status})"),
                (false, Some(p)) => format!(
                    "already processing ({} queued, next stage: {})",
                    p.action(),
                    p.stage()
                ),
            },
            Self::AlreadyQueued { action } => format!("{action} is already queued"),
            Self::MissingDependencies { missing } => {
                let names: Vec<_> = missing.iter().map(DependencyField::as_str).collect();
                format!("missing dependencies: {}", names.join(", "))
            }
            Self::StageNotApplicable { action } => {
                format!("{action} does not apply to a manually uploaded video")
            }
            Self::AlreadyComplete => "every stage has already completed".to_string(),
        }
    }
}

/// Validate one `(job, action)` request.
///
/// Checks run in a fixed order and the first failure wins:
/// 1. already processing,
/// 2. already queued,
/// 3. missing dependencies,
/// 4. stage not applicable (earlier stages on a manual upload).
///
/// A manual upload's `run_all` is gated on the upload inputs and runs only
/// the upload stage. On success returns the pending action to record with `status = pending`.
/// A queued action on a job that is not `pending` (a stale value on a
/// failed or completed job) never blocks a new request.
pub fn validate_action_request(
    job: &JobSnapshot,
    action: PipelineAction,
) -> Result<PendingAction, ActionRejection> {
    let queued = match job.status {
        JobStatus::Pending => job.pending_action,
        _ => None,
    };

    // 1. Already processing.
    if job.status.is_in_flight() {
        return Err(ActionRejection::AlreadyProcessing {
            status: job.status,
            pending: job.pending_action,
        });
    }
    if action == PipelineAction::RunAll && queued.is_some_and(blocks_run_all) {
        return Err(ActionRejection::AlreadyProcessing {
            status: job.status,
            pending: queued,
        });
    }

    // 2. Already queued.
    if let Some(PendingAction::Stage { stage }) = queued {
        if stage.action() == action {
            return Err(ActionRejection::AlreadyQueued { action });
        }
    }

    // 3. Missing dependencies.
    let gated_on = match action {
        PipelineAction::RunAll if job.manual_upload => PipelineAction::PostToYoutube,
        _ => action,
    };
    let missing = missing_dependencies(gated_on, &job.artifacts);
    if !missing.is_empty() {
        return Err(ActionRejection::MissingDependencies { missing });
    }

    match action.stage() {
        // 4. Stage not applicable.
        Some(stage) if !job.is_eligible(stage) => {
            Err(ActionRejection::StageNotApplicable { action })
        }
        Some(stage) => Ok(PendingAction::Stage { stage }),
        None => job
            .first_missing_stage()
            .map(|next| PendingAction::RunAll { next })
            .ok_or(ActionRejection::AlreadyComplete),
    }
}

/// A queued `run_all` chain, or a queued request for any stage after the
/// script, means a `run_all` is already effectively under way.
fn blocks_run_all(pending: PendingAction) -> bool {
    match pending {
        PendingAction::RunAll { .. } => true,
        PendingAction::Stage { stage } => stage != Stage::Script,
    }
}

// ---------------------------------------------------------------------------
// Batch validation
// ---------------------------------------------------------------------------

/// A rejection attributed to one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRejection {
    pub job_id: DbId,
    pub rejection: ActionRejection,
}

/// The outcome of refusing a batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRejection {
    pub action: PipelineAction,
    /// Earliest rejection kind (in check order) among the offending jobs.
    pub kind: RejectionKind,
    pub rejections: Vec<JobRejection>,
}

impl BatchRejection {
    /// One line per offending job.
    pub fn message(&self) -> String {
        self.rejections
            .iter()
            .map(|r| format!("Job {}: {}", r.job_id, r.rejection.reason()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Validate every job in a batch. All-or-nothing: if any job is refused the
/// whole batch is refused and every offending job is reported.
pub fn validate_batch(
    action: PipelineAction,
    jobs: &[(DbId, JobSnapshot)],
) -> Result<Vec<(DbId, PendingAction)>, BatchRejection> {
    let mut accepted = Vec::with_capacity(jobs.len());
    let mut rejections = Vec::new();

    for (job_id, snapshot) in jobs {
        match validate_action_request(snapshot, action) {
            Ok(pending) => accepted.push((*job_id, pending)),
            Err(rejection) => rejections.push(JobRejection {
                job_id: *job_id,
                rejection,
            }),
        }
    }

    match rejections.iter().map(|r| r.rejection.kind()).min() {
        None => Ok(accepted),
        Some(kind) => Err(BatchRejection {
            action,
            kind,
            rejections,
        }),
    }
}

// ---------------------------------------------------------------------------
// Stage transitions
// ---------------------------------------------------------------------------

/// The `(status, pending action)` pair a stage executor writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub status: JobStatus,
    pub pending_action: Option<PendingAction>,
}

/// Whether `stage`'s executor may claim this job.
pub fn is_claimable_by(stage: Stage, job: &JobSnapshot) -> bool {
    job.status == JobStatus::Pending && job.pending_action.map(|p| p.stage()) == Some(stage)
}

/// State written when an executor claims a job for `stage`.
///
/// A single-stage request is consumed by the claim; a `run_all` chain stays
/// recorded so the executor knows to continue it.
pub fn claim_transition(stage: Stage, pending: PendingAction) -> Transition {
    Transition {
        status: stage.in_flight_status(),
        pending_action: match pending {
            PendingAction::Stage { .. } => None,
            PendingAction::RunAll { .. } => Some(PendingAction::RunAll { next: stage }),
        },
    }
}

/// State written after `stage` succeeds.
///
/// A `run_all` chain advances to the next stage whose output is still
/// missing and re-enters the queue; when nothing is left, or for a
/// single-stage request, the job completes.
pub fn success_transition(
    stage: Stage,
    pending_at_claim: Option<PendingAction>,
    artifacts_after: &JobArtifacts,
) -> Transition {
    let completed = Transition {
        status: JobStatus::Completed,
        pending_action: None,
    };
    match pending_at_claim {
        Some(PendingAction::RunAll { .. }) => match next_missing_stage_after(stage, artifacts_after)
        {
            Some(next) => Transition {
                status: JobStatus::Pending,
                pending_action: Some(PendingAction::RunAll { next }),
            },
            None => completed,
        },
        _ => completed,
    }
}

/// State written when a stage fails. The pending action is cleared so a
/// retry of any action is judged on the job's artifacts alone.
pub fn failure_transition() -> Transition {
    Transition {
        status: JobStatus::Failed,
        pending_action: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
