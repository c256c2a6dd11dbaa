//! Pipeline stages, requestable actions, and the queued-action tagged type.
//!
//! `action_needed` is stored as one of the five action names. When it is
//! `run_all`, `run_all_stage` holds the stage the chain is waiting on; the
//! pair is decoded into a single [`PendingAction`].

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job_status::JobStatus;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const ACTION_GENERATE_SCRIPT: &str = "generate_script";
pub const ACTION_GENERATE_VOICEOVER: &str = "generate_voiceover";
pub const ACTION_CREATE_VIDEO: &str = "create_video";
pub const ACTION_POST_TO_YOUTUBE: &str = "post_to_youtube";
pub const ACTION_RUN_ALL: &str = "run_all";

pub const VALID_ACTIONS: &[&str] = &[
    ACTION_GENERATE_SCRIPT,
    ACTION_GENERATE_VOICEOVER,
    ACTION_CREATE_VIDEO,
    ACTION_POST_TO_YOUTUBE,
    ACTION_RUN_ALL,
];

pub const STAGE_SCRIPT: &str = "script";
pub const STAGE_VOICEOVER: &str = "voiceover";
pub const STAGE_VIDEO: &str = "video";
pub const STAGE_UPLOAD: &str = "upload";

pub const VALID_STAGES: &[&str] = &[STAGE_SCRIPT, STAGE_VOICEOVER, STAGE_VIDEO, STAGE_UPLOAD];

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One step of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Script,
    Voiceover,
    Video,
    Upload,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Self::Script, Self::Voiceover, Self::Video, Self::Upload];

    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            STAGE_SCRIPT => Ok(Self::Script),
            STAGE_VOICEOVER => Ok(Self::Voiceover),
            STAGE_VIDEO => Ok(Self::Video),
            STAGE_UPLOAD => Ok(Self::Upload),
            _ => Err(format!(
                "Invalid stage '{s}'. Must be one of: {}",
                VALID_STAGES.join(", ")
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => STAGE_SCRIPT,
            Self::Voiceover => STAGE_VOICEOVER,
            Self::Video => STAGE_VIDEO,
            Self::Upload => STAGE_UPLOAD,
        }
    }

    /// The action that requests exactly this stage.
    pub fn action(&self) -> PipelineAction {
        match self {
            Self::Script => PipelineAction::GenerateScript,
            Self::Voiceover => PipelineAction::GenerateVoiceover,
            Self::Video => PipelineAction::CreateVideo,
            Self::Upload => PipelineAction::PostToYoutube,
        }
    }

    /// Status a job carries while this stage's executor holds it.
    pub fn in_flight_status(&self) -> JobStatus {
        match self {
            Self::Script => JobStatus::GeneratingScript,
            Self::Voiceover => JobStatus::CreatingVoiceover,
            Self::Video => JobStatus::RenderingVideo,
            Self::Upload => JobStatus::Uploading,
        }
    }

    /// Stages strictly after this one, in order.
    pub fn following(&self) -> impl Iterator<Item = Stage> + '_ {
        Self::ALL.into_iter().filter(move |s| s > self)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PipelineAction
// ---------------------------------------------------------------------------

/// An action a user (or external trigger) can request for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineAction {
    GenerateScript,
    GenerateVoiceover,
    CreateVideo,
    PostToYoutube,
    RunAll,
}

impl PipelineAction {
    /// Parse a requested action name. Unknown names are an
    /// [`CoreError::InvalidAction`].
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            ACTION_GENERATE_SCRIPT => Ok(Self::GenerateScript),
            ACTION_GENERATE_VOICEOVER => Ok(Self::GenerateVoiceover),
            ACTION_CREATE_VIDEO => Ok(Self::CreateVideo),
            ACTION_POST_TO_YOUTUBE => Ok(Self::PostToYoutube),
            ACTION_RUN_ALL => Ok(Self::RunAll),
            _ => Err(CoreError::InvalidAction(format!(
                "'{s}' is not a valid action. Must be one of: {}",
                VALID_ACTIONS.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateScript => ACTION_GENERATE_SCRIPT,
            Self::GenerateVoiceover => ACTION_GENERATE_VOICEOVER,
            Self::CreateVideo => ACTION_CREATE_VIDEO,
            Self::PostToYoutube => ACTION_POST_TO_YOUTUBE,
            Self::RunAll => ACTION_RUN_ALL,
        }
    }

    /// The single stage this action runs, `None` for `run_all`.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::GenerateScript => Some(Stage::Script),
            Self::GenerateVoiceover => Some(Stage::Voiceover),
            Self::CreateVideo => Some(Stage::Video),
            Self::PostToYoutube => Some(Stage::Upload),
            Self::RunAll => None,
        }
    }
}

impl std::fmt::Display for PipelineAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PendingAction
// ---------------------------------------------------------------------------

/// The work a job is waiting to have dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    /// A single stage was requested explicitly.
    Stage { stage: Stage },
    /// A `run_all` chain, currently positioned at `next`.
    RunAll { next: Stage },
}

impl PendingAction {
    /// Decode the `(action_needed, run_all_stage)` column pair.
    ///
    /// Returns `Ok(None)` when no action is queued.
    pub fn from_columns(
        action_needed: Option<&str>,
        run_all_stage: Option<&str>,
    ) -> Result<Option<Self>, String> {
        let Some(action) = action_needed else {
            return Ok(None);
        };
        let action = PipelineAction::parse(action).map_err(|e| e.to_string())?;
        match action.stage() {
            Some(stage) => Ok(Some(Self::Stage { stage })),
            None => {
                let next = run_all_stage
                    .ok_or_else(|| "run_all pending action without a run_all_stage".to_string())
                    .and_then(Stage::from_str_value)?;
                Ok(Some(Self::RunAll { next }))
            }
        }
    }

    /// Encode into the `(action_needed, run_all_stage)` column pair.
    pub fn to_columns(pending: Option<Self>) -> (Option<&'static str>, Option<&'static str>) {
        match pending {
            None => (None, None),
            Some(Self::Stage { stage }) => (Some(stage.action().as_str()), None),
            Some(Self::RunAll { next }) => (Some(ACTION_RUN_ALL), Some(next.as_str())),
        }
    }

    /// The action name as it appears on the wire (`action_needed`).
    pub fn action(&self) -> PipelineAction {
        match self {
            Self::Stage { stage } => stage.action(),
            Self::RunAll { .. } => PipelineAction::RunAll,
        }
    }

    /// The stage a dispatcher should run next for this pending action.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Stage { stage } => *stage,
            Self::RunAll { next } => *next,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
