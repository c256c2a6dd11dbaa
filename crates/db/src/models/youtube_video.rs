//! Published YouTube video model.

use autotube_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `youtube_videos` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct YoutubeVideo {
    pub id: DbId,
    pub job_id: DbId,
    pub video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: Timestamp,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct CreateYoutubeVideo {
    pub job_id: DbId,
    pub video_id: String,
    pub title: String,
    pub description: Option<String>,
}
