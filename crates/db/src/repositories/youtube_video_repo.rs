//! Repository for the `youtube_videos` table.

use autotube_core::types::DbId;
use sqlx::PgPool;

use crate::models::youtube_video::{CreateYoutubeVideo, YoutubeVideo};

/// Column list for `youtube_videos` queries.
const COLUMNS: &str = "id, job_id, video_id, title, description, published_at, created_at";

pub struct YoutubeVideoRepo;

impl YoutubeVideoRepo {
    /// Record a published video. Re-recording the same YouTube id updates
    /// the existing row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateYoutubeVideo,
    ) -> Result<YoutubeVideo, sqlx::Error> {
        let query = format!(
            "INSERT INTO youtube_videos (job_id, video_id, title, description) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (video_id) DO UPDATE SET \
                 title = EXCLUDED.title, description = EXCLUDED.description \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, YoutubeVideo>(&query)
            .bind(input.job_id)
            .bind(&input.video_id)
            .bind(&input.title)
            .bind(&input.description)
            .fetch_one(pool)
            .await
    }

    pub async fn list_by_job(pool: &PgPool, job_id: DbId) -> Result<Vec<YoutubeVideo>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM youtube_videos WHERE job_id = $1 ORDER BY published_at DESC"
        );
        sqlx::query_as::<_, YoutubeVideo>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
