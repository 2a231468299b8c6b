use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{NewVideo, Video, VideoRow, VideoStatus};

/// Durable metadata store for video records.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn create(&self, video: NewVideo) -> Result<Video>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Video>>;

    /// Compare-and-set on the status column. Returns `false` when the record
    /// is missing or no longer holds `from`.
    async fn update_status(&self, id: &str, from: VideoStatus, to: VideoStatus) -> Result<bool>;
}

pub struct PgVideoRepository {
    pool: PgPool,
}

impl PgVideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    async fn create(&self, video: NewVideo) -> Result<Video> {
        let id = Uuid::new_v4().to_string();
        let file_name = format!("{}.{}", id, video.original_name);

        let row = sqlx::query_as::<_, VideoRow>(
            r#"
            INSERT INTO videos (id, user_id, title, description, file_name, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&video.user_id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&file_name)
        .bind(VideoStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(Video::try_from(row)?)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Video>> {
        let row = sqlx::query_as::<_, VideoRow>("SELECT * FROM videos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Video::try_from).transpose()?)
    }

    async fn update_status(&self, id: &str, from: VideoStatus, to: VideoStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE videos SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
