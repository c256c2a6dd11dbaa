//! The stage executor contract.
//!
//! An executor turns a claimed job into [`StageOutputs`]. It never touches
//! `status` or the pending action: the [`StageRunner`](crate::runner::StageRunner)
//! writes those from the state machine once the executor returns.

use async_trait::async_trait;
use autotube_core::action::Stage;
use autotube_core::ffmpeg::FfmpegError;
use autotube_core::storage::StorageError;
use autotube_core::sub_status::SubStatus;
use autotube_core::types::DbId;
use autotube_db::models::job::{Job, StageOutputs};
use autotube_db::repositories::JobRepo;
use sqlx::PgPool;

use crate::llm::LlmError;
use crate::youtube::YoutubeError;

/// Errors a stage can fail with. The display text becomes the job's
/// `error_message`.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("FFmpeg failed: {0}")]
    Ffmpeg(#[from] FfmpegError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("YouTube upload failed: {0}")]
    Youtube(#[from] YoutubeError),

    #[error("Text-to-speech failed: {0}")]
    Tts(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unexpected model reply: {0}")]
    MalformedReply(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Where executors report sub-status markers.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, sub_status: SubStatus);
}

/// Writes sub-status markers to the job row.
///
/// Reporting is best-effort: failures are logged and never fail the stage.
pub struct DbProgress<'a> {
    pub pool: &'a PgPool,
    pub job_id: DbId,
    pub stage: Stage,
    pub worker: &'a str,
}

#[async_trait]
impl ProgressReporter for DbProgress<'_> {
    async fn report(&self, sub_status: SubStatus) {
        match JobRepo::set_sub_status(self.pool, self.job_id, self.stage, self.worker, sub_status)
            .await
        {
            Ok(true) => {
                tracing::debug!(job_id = self.job_id, stage = %self.stage, %sub_status, "Progress");
            }
            Ok(false) => {
                tracing::warn!(
                    job_id = self.job_id,
                    stage = %self.stage,
                    %sub_status,
                    "Job no longer held by this worker",
                );
            }
            Err(e) => {
                tracing::warn!(job_id = self.job_id, error = %e, "Failed to record sub-status");
            }
        }
    }
}

/// One pipeline stage.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    fn stage(&self) -> Stage;

    /// Produce the stage's outputs for a claimed job.
    async fn execute(
        &self,
        job: &Job,
        progress: &dyn ProgressReporter,
    ) -> Result<StageOutputs, ExecutionError>;
}

/// A required text input of `job`, or [`ExecutionError::InvalidInput`].
pub(crate) fn required_text<'a>(
    value: Option<&'a str>,
    field: &str,
) -> Result<&'a str, ExecutionError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ExecutionError::InvalidInput(format!("job has no {field}")))
}
