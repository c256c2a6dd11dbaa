//! YouTube Data API v3 client for the upload stage.
//!
//! Mints a short-lived access token from the configured refresh token, then
//! uploads the video and its metadata in one `multipart/related` insert
//! request.

use std::path::Path;

use autotube_core::storage::content_type_for_extension;
use autotube_core::validation::PrivacyStatus;
use serde::Deserialize;

use crate::config::YoutubeCredentials;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=multipart&part=snippet,status";

/// "People & Blogs".
pub const DEFAULT_CATEGORY_ID: &str = "22";

#[derive(Debug, thiserror::Error)]
pub enum YoutubeError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("YouTube API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("failed to read video file: {0}")]
    Io(#[from] std::io::Error),

    #[error("YouTube credentials are not configured")]
    NotConfigured,
}

/// Snippet and status fields sent with the upload.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub privacy: PrivacyStatus,
}

impl VideoMetadata {
    /// The `videos.insert` resource body.
    pub fn to_resource(&self) -> serde_json::Value {
        serde_json::json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": DEFAULT_CATEGORY_ID,
            },
            "status": {
                "privacyStatus": self.privacy.as_str(),
                "selfDeclaredMadeForKids": false,
            },
        })
    }
}

/// Public watch page of an uploaded video.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
}

pub struct YoutubeClient {
    client: reqwest::Client,
    credentials: YoutubeCredentials,
}

impl YoutubeClient {
    pub fn new(credentials: YoutubeCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }

    /// Exchange the refresh token for an access token.
    pub async fn access_token(&self) -> Result<String, YoutubeError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;
        let token: TokenResponse = Self::parse_response(response).await?;
        Ok(token.access_token)
    }

    /// Upload the video at `path` and return its YouTube id.
    pub async fn upload(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<String, YoutubeError> {
        let token = self.access_token().await?;
        let video = tokio::fs::read(path).await?;
        let video_type = content_type_for_extension(
            path.extension().and_then(|e| e.to_str()).unwrap_or("mp4"),
        );

        let boundary = format!("autotube-{}", uuid::Uuid::new_v4().simple());
        let body = related_body(&boundary, &metadata.to_resource(), video_type, &video);
        tracing::debug!(
            size = video.len(),
            privacy = metadata.privacy.as_str(),
            "Uploading video to YouTube",
        );

        let response = self
            .client
            .post(UPLOAD_URL)
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;
        let inserted: InsertResponse = Self::parse_response(response).await?;
        Ok(inserted.id)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, YoutubeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(YoutubeError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

/// Two-part `multipart/related` body: JSON metadata, then the media bytes.
fn related_body(
    boundary: &str,
    resource: &serde_json::Value,
    media_type: &str,
    media: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + 1024);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{resource}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {media_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
