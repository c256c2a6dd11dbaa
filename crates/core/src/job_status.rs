//! Job lifecycle status.
//!
//! Stored as TEXT in `video_jobs.status`; the string values here must match
//! the CHECK constraint in `20260301000002_create_video_jobs_table.sql`.

use serde::{Deserialize, Serialize};

use crate::action::Stage;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_GENERATING_SCRIPT: &str = "generating_script";
pub const STATUS_CREATING_VOICEOVER: &str = "creating_voiceover";
pub const STATUS_RENDERING_VIDEO: &str = "rendering_video";
pub const STATUS_UPLOADING: &str = "uploading";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

/// All valid status strings, in lifecycle order.
pub const VALID_STATUSES: &[&str] = &[
    STATUS_PENDING,
    STATUS_GENERATING_SCRIPT,
    STATUS_CREATING_VOICEOVER,
    STATUS_RENDERING_VIDEO,
    STATUS_UPLOADING,
    STATUS_COMPLETED,
    STATUS_FAILED,
];

// ---------------------------------------------------------------------------
// Enum
// ---------------------------------------------------------------------------

/// Status of a video job.
///
/// `Pending` is idle (possibly with a queued action), the four stage
/// statuses are in flight, `Completed` and `Failed` are terminal for the
/// current request but both accept new action requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    GeneratingScript,
    CreatingVoiceover,
    RenderingVideo,
    Uploading,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        Self::Pending,
        Self::GeneratingScript,
        Self::CreatingVoiceover,
        Self::RenderingVideo,
        Self::Uploading,
        Self::Completed,
        Self::Failed,
    ];

    /// The four in-flight statuses, one per stage.
    pub const IN_FLIGHT: [JobStatus; 4] = [
        Self::GeneratingScript,
        Self::CreatingVoiceover,
        Self::RenderingVideo,
        Self::Uploading,
    ];

    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            STATUS_PENDING => Ok(Self::Pending),
            STATUS_GENERATING_SCRIPT => Ok(Self::GeneratingScript),
            STATUS_CREATING_VOICEOVER => Ok(Self::CreatingVoiceover),
            STATUS_RENDERING_VIDEO => Ok(Self::RenderingVideo),
            STATUS_UPLOADING => Ok(Self::Uploading),
            STATUS_COMPLETED => Ok(Self::Completed),
            STATUS_FAILED => Ok(Self::Failed),
            _ => Err(format!(
                "Invalid job status '{s}'. Must be one of: {}",
                VALID_STATUSES.join(", ")
            )),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => STATUS_PENDING,
            Self::GeneratingScript => STATUS_GENERATING_SCRIPT,
            Self::CreatingVoiceover => STATUS_CREATING_VOICEOVER,
            Self::RenderingVideo => STATUS_RENDERING_VIDEO,
            Self::Uploading => STATUS_UPLOADING,
            Self::Completed => STATUS_COMPLETED,
            Self::Failed => STATUS_FAILED,
        }
    }

    /// Whether an executor is (supposedly) working on the job right now.
    pub fn is_in_flight(&self) -> bool {
        self.stage().is_some()
    }

    /// The stage this status represents, for in-flight statuses.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::GeneratingScript => Some(Stage::Script),
            Self::CreatingVoiceover => Some(Stage::Voiceover),
            Self::RenderingVideo => Some(Stage::Video),
            Self::Uploading => Some(Stage::Upload),
            Self::Pending | Self::Completed | Self::Failed => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
