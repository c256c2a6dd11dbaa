//! Manual video upload: `POST /api/v1/jobs/upload`.
//!
//! Creates a job whose `video_url` points at the uploaded file, so it can
//! go straight to `post_to_youtube`.

use std::path::PathBuf;

use autotube_core::storage::{artifact_key, video_extension, ArtifactKind, StorageError};
use autotube_core::validation::{
    normalize_tags, parse_tags_field, validate_description, validate_title, PrivacyStatus,
};
use autotube_db::models::job::CreateManualUploadJob;
use autotube_db::repositories::JobRepo;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};
use crate::handlers::jobs::remove_artifacts;
use crate::response::{DataResponse, JobView};
use crate::state::AppState;

/// The `file` field, spooled to a scratch directory that is removed on drop.
#[derive(Debug)]
struct StagedVideo {
    _dir: TempDir,
    path: PathBuf,
    ext: &'static str,
    size: u64,
}

/// Form fields of an upload, before validation.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<StagedVideo>,
    title: Option<String>,
    description: Option<String>,
    tags: Option<String>,
    privacy_status: Option<String>,
}

fn staging_error(e: std::io::Error) -> AppError {
    AppError::Storage(StorageError::from(e))
}

/// Stream the file field to disk chunk by chunk so a large video is never
/// held in memory. The extension is checked before anything is written.
async fn stage_video(mut field: Field<'_>) -> AppResult<StagedVideo> {
    let ext = video_extension(field.file_name().unwrap_or(""))?;
    let dir = tempfile::Builder::new()
        .prefix("autotube-upload-")
        .tempdir()
        .map_err(staging_error)?;
    let path = dir.path().join(format!("video.{ext}"));
    let mut file = tokio::fs::File::create(&path).await.map_err(staging_error)?;

    let mut size = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        file.write_all(&chunk).await.map_err(staging_error)?;
        size += chunk.len() as u64;
    }
    file.flush().await.map_err(staging_error)?;

    Ok(StagedVideo {
        _dir: dir,
        path,
        ext,
        size,
    })
}

async fn read_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => form.file = Some(stage_video(field).await?),
            "title" | "description" | "tags" | "privacyStatus" | "privacy_status" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                match name.as_str() {
                    "title" => form.title = Some(text),
                    "description" => form.description = Some(text),
                    "tags" => form.tags = Some(text),
                    _ => form.privacy_status = Some(text),
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST /api/v1/jobs/upload
///
/// Multipart fields: `file` (required, `.mp4`/`.mov`/`.webm`), `title`
/// (required), `description`, `tags` (JSON array or comma-separated),
/// `privacyStatus` (default `private`).
pub async fn upload_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let form = read_form(multipart).await?;

    let video = form
        .file
        .ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    if video.size == 0 {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }

    let title = form.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(AppError::BadRequest("Missing required 'title' field".into()));
    }
    validate_title(title)?;

    if let Some(description) = &form.description {
        validate_description(description)?;
    }
    let tags = match &form.tags {
        Some(raw) => normalize_tags(&parse_tags_field(raw))?,
        None => Vec::new(),
    };
    let privacy_status = match form.privacy_status.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => PrivacyStatus::from_str_value(raw)?,
        _ => PrivacyStatus::default(),
    };

    // The stored key embeds the job id, so the id is reserved first and the
    // row inserted once the file is in place.
    let job_id = JobRepo::reserve_id(&state.pool).await?;
    let kind = ArtifactKind::Video;
    let key = artifact_key(job_id, kind, video.ext);
    let video_url = state
        .artifacts
        .put_file(kind.bucket(), &key, &video.path)
        .await?;

    let input = CreateManualUploadJob {
        title: title.to_string(),
        description: form.description,
        tags,
        privacy_status,
        video_url,
    };

    let job = match JobRepo::create_manual_upload(&state.pool, job_id, &input).await {
        Ok(job) => job,
        Err(e) => {
            remove_artifacts(state.artifacts.as_ref(), &[job_id]).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        job_id,
        bytes = video.size,
        privacy = privacy_status.as_str(),
        "Manual upload job created",
    );

    let data = JobView::new(job, Utc::now(), state.config.stale_after_secs)?;
    Ok((StatusCode::CREATED, Json(DataResponse { data })))
}
