//! Upload stage: publishes the rendered (or manually uploaded) video.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use autotube_core::action::Stage;
use autotube_core::storage::{ArtifactStore, ACCEPTED_VIDEO_EXTENSIONS};
use autotube_core::sub_status::SubStatus;
use autotube_db::models::job::{Job, StageOutputs};
use autotube_db::models::youtube_video::CreateYoutubeVideo;
use autotube_db::repositories::YoutubeVideoRepo;
use sqlx::PgPool;

use crate::executor::{required_text, ExecutionError, ProgressReporter, StageExecutor};
use crate::youtube::{watch_url, VideoMetadata, YoutubeClient};

pub struct UploadExecutor {
    pool: PgPool,
    youtube: YoutubeClient,
    store: Arc<dyn ArtifactStore>,
    temp_dir: PathBuf,
}

impl UploadExecutor {
    pub fn new(
        pool: PgPool,
        youtube: YoutubeClient,
        store: Arc<dyn ArtifactStore>,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            pool,
            youtube,
            store,
            temp_dir,
        }
    }
}

#[async_trait]
impl StageExecutor for UploadExecutor {
    fn stage(&self) -> Stage {
        Stage::Upload
    }

    async fn execute(
        &self,
        job: &Job,
        progress: &dyn ProgressReporter,
    ) -> Result<StageOutputs, ExecutionError> {
        let metadata = video_metadata(job)?;
        let video_url = required_text(job.video_url.as_deref(), "video_url")?;
        let work = tempfile::Builder::new()
            .prefix(&format!("autotube-upload-{}-", job.id))
            .tempdir_in(&self.temp_dir)?;

        progress.report(SubStatus::FetchingVideo).await;
        let video = work
            .path()
            .join(format!("video.{}", url_video_extension(video_url)));
        self.store.download(video_url, &video).await?;

        progress.report(SubStatus::UploadingToYoutube).await;
        let video_id = self.youtube.upload(&video, &metadata).await?;
        let youtube_url = watch_url(&video_id);
        tracing::info!(job_id = job.id, video_id = %video_id, url = %youtube_url, "Published to YouTube");

        let record = CreateYoutubeVideo {
            job_id: job.id,
            video_id: video_id.clone(),
            title: metadata.title.clone(),
            description: Some(metadata.description.clone()),
        };
        if let Err(e) = YoutubeVideoRepo::create(&self.pool, &record).await {
            tracing::warn!(job_id = job.id, video_id = %video_id, error = %e, "Failed to record published video");
        }

        Ok(StageOutputs {
            youtube_url: Some(youtube_url),
            youtube_video_id: Some(video_id),
            ..Default::default()
        })
    }
}

/// Upload metadata for `job`. An empty description is allowed; an absent
/// one is not.
pub fn video_metadata(job: &Job) -> Result<VideoMetadata, ExecutionError> {
    let title = required_text(job.title.as_deref(), "title")?;
    let description = job
        .description
        .as_deref()
        .ok_or_else(|| ExecutionError::InvalidInput("job has no description".into()))?;
    Ok(VideoMetadata {
        title: title.to_string(),
        description: description.to_string(),
        tags: job.tags.clone(),
        privacy: job.privacy(),
    })
}

/// Extension of the stored video named by `url`, defaulting to `mp4`.
fn url_video_extension(url: &str) -> &'static str {
    let ext = url
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .unwrap_or_default();
    ACCEPTED_VIDEO_EXTENSIONS
        .iter()
        .find(|accepted| accepted.eq_ignore_ascii_case(ext))
        .copied()
        .unwrap_or("mp4")
}

#[cfg(test)]
mod tests {
    use super::*;
    use autotube_core::validation::PrivacyStatus;
    use chrono::Utc;

    fn job() -> Job {
        Job {
            id: 7,
            topic: "t".into(),
            status: "uploading".into(),
            script: None,
            title: Some("  My Video ".into()),
            description: Some(String::new()),
            tags: vec!["a".into()],
            voiceover_url: None,
            video_url: Some("http://localhost:3000/storage/renders/7/video.webm".into()),
            youtube_url: None,
            youtube_video_id: None,
            error_message: None,
            action_needed: None,
            run_all_stage: None,
            sub_status: None,
            sub_status_at: None,
            manual_upload: true,
            privacy_status: "public".into(),
            claimed_by: Some("w".into()),
            claimed_at: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn metadata_uses_job_fields_and_privacy() {
        let metadata = video_metadata(&job()).unwrap();
        assert_eq!(metadata.title, "My Video");
        assert_eq!(metadata.description, "");
        assert_eq!(metadata.tags, vec!["a"]);
        assert_eq!(metadata.privacy, PrivacyStatus::Public);
    }

    #[test]
    fn missing_description_is_rejected() {
        let mut job = job();
        job.description = None;
        assert!(video_metadata(&job).is_err());
    }

    #[test]
    fn extension_follows_stored_video() {
        assert_eq!(url_video_extension("http://h/storage/renders/7/video.webm"), "webm");
        assert_eq!(url_video_extension("http://h/storage/renders/7/video.MOV"), "mov");
        assert_eq!(url_video_extension("http://h/storage/renders/7/video"), "mp4");
    }
}
