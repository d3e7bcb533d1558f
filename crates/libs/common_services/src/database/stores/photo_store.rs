use crate::database::DbError;
use common_types::Photo;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

pub struct PhotoStore;

impl PhotoStore {
    /// Fetches one page of a session's photos, oldest first.
    pub async fn list_page(
        executor: impl Executor<'_, Database = Postgres>,
        session_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Photo>, DbError> {
        Ok(sqlx::query_as::<_, Photo>(
            r"
            SELECT id, session_id, thumbnail_url, original_url, created_at
            FROM photos
            WHERE session_id = $1
            ORDER BY created_at ASC, id ASC
            OFFSET $2
            LIMIT $3
            ",
        )
        .bind(session_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(executor)
        .await?)
    }
}
