//! Video stage: background clip + burned captions + voiceover.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use autotube_core::action::Stage;
use autotube_core::captions::build_captions;
use autotube_core::ffmpeg::{media_duration_secs, render_video, RenderJob};
use autotube_core::storage::{artifact_key, ArtifactKind, ArtifactStore};
use autotube_core::sub_status::SubStatus;
use autotube_core::types::DbId;
use autotube_db::models::job::{Job, StageOutputs};

use crate::executor::{required_text, ExecutionError, ProgressReporter, StageExecutor};

/// Extensions recognised as background clips.
const BACKGROUND_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv"];

pub struct VideoExecutor {
    store: Arc<dyn ArtifactStore>,
    background_dir: PathBuf,
    temp_dir: PathBuf,
}

impl VideoExecutor {
    pub fn new(store: Arc<dyn ArtifactStore>, background_dir: PathBuf, temp_dir: PathBuf) -> Self {
        Self {
            store,
            background_dir,
            temp_dir,
        }
    }
}

#[async_trait]
impl StageExecutor for VideoExecutor {
    fn stage(&self) -> Stage {
        Stage::Video
    }

    async fn execute(
        &self,
        job: &Job,
        progress: &dyn ProgressReporter,
    ) -> Result<StageOutputs, ExecutionError> {
        let script = required_text(job.script.as_deref(), "script")?;
        let voiceover_url = required_text(job.voiceover_url.as_deref(), "voiceover_url")?;
        let work = tempfile::Builder::new()
            .prefix(&format!("autotube-video-{}-", job.id))
            .tempdir_in(&self.temp_dir)?;

        progress.report(SubStatus::FetchingVoiceover).await;
        let audio = work.path().join("voiceover.mp3");
        self.store.download(voiceover_url, &audio).await?;

        progress.report(SubStatus::RenderingVideo).await;
        let duration_secs = media_duration_secs(&audio).await?;
        let background = pick_background(&self.background_dir, job.id).await?;
        let subtitles = work.path().join("captions.ass");
        tokio::fs::write(&subtitles, build_captions(script, duration_secs)).await?;

        let output = work.path().join("video.mp4");
        tracing::info!(
            job_id = job.id,
            duration_secs,
            background = %background.display(),
            "Rendering video",
        );
        render_video(&RenderJob {
            background,
            audio,
            subtitles,
            output: output.clone(),
            duration_secs,
        })
        .await?;

        progress.report(SubStatus::UploadingRender).await;
        let kind = ArtifactKind::Video;
        let url = self
            .store
            .put_file(
                kind.bucket(),
                &artifact_key(job.id, kind, kind.default_extension()),
                &output,
            )
            .await?;
        tracing::info!(job_id = job.id, url = %url, "Render stored");

        Ok(StageOutputs {
            video_url: Some(url),
            ..Default::default()
        })
    }
}

/// Pick a background clip from `dir` for `job_id`.
///
/// Clips are sorted by file name and chosen by `job_id` modulo their count,
/// so a job re-rendered later gets the same background.
pub async fn pick_background(dir: &Path, job_id: DbId) -> Result<PathBuf, ExecutionError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        ExecutionError::InvalidInput(format!(
            "cannot read background directory {}: {e}",
            dir.display()
        ))
    })?;

    let mut clips = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_clip = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                BACKGROUND_EXTENSIONS
                    .iter()
                    .any(|accepted| accepted.eq_ignore_ascii_case(ext))
            });
        if is_clip && entry.file_type().await?.is_file() {
            clips.push(path);
        }
    }

    if clips.is_empty() {
        return Err(ExecutionError::InvalidInput(format!(
            "no background videos in {}",
            dir.display()
        )));
    }
    clips.sort();
    let index = job_id.rem_euclid(clips.len() as DbId) as usize;
    Ok(clips.swap_remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn background_choice_is_stable_per_job() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.mp4", "a.mov", "b.webm", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let pick = |id| pick_background(dir.path(), id);
        assert_eq!(pick(3).await.unwrap(), dir.path().join("a.mov"));
        assert_eq!(pick(4).await.unwrap(), dir.path().join("b.webm"));
        assert_eq!(pick(5).await.unwrap(), dir.path().join("c.mp4"));
        assert_eq!(pick(5).await.unwrap(), pick(5).await.unwrap());
    }

    #[tokio::test]
    async fn empty_background_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.md"), b"x").unwrap();
        assert_matches!(
            pick_background(dir.path(), 1).await,
            Err(ExecutionError::InvalidInput(_))
        );
        assert_matches!(
            pick_background(&dir.path().join("missing"), 1).await,
            Err(ExecutionError::InvalidInput(_))
        );
    }
}
