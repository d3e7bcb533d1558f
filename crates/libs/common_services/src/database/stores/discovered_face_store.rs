use crate::database::DbError;
use common_types::{DiscoveredFace, NewDiscoveredFace, PersistedFaceKey};
use sqlx::{Executor, Postgres, QueryBuilder};
use uuid::Uuid;

pub struct DiscoveredFaceStore;

impl DiscoveredFaceStore {
    /// Upserts a batch of faces on their `(photo_id, bbox)` key.
    ///
    /// Every submitted face comes back, inserted or updated, with its id and key.
    /// On conflict only the detection data is refreshed; naming state is kept.
    /// The batch must not contain the same key twice.
    pub async fn upsert_batch(
        executor: impl Executor<'_, Database = Postgres>,
        faces: &[NewDiscoveredFace],
    ) -> Result<Vec<PersistedFaceKey>, DbError> {
        if faces.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO discovered_faces (session_id, photo_id, embedding, crop_url, \
             detection_score, bbox_x, bbox_y, bbox_width, bbox_height) ",
        );
        builder.push_values(faces, |mut row, face| {
            row.push_bind(face.session_id)
                .push_bind(face.photo_id)
                .push_bind(face.embedding.clone())
                .push_bind(face.crop_url.clone())
                .push_bind(face.detection_score)
                .push_bind(face.bbox.x)
                .push_bind(face.bbox.y)
                .push_bind(face.bbox.width)
                .push_bind(face.bbox.height);
        });
        builder.push(
            r"
            ON CONFLICT (photo_id, bbox_x, bbox_y, bbox_width, bbox_height) DO UPDATE
            SET session_id = EXCLUDED.session_id,
                embedding = EXCLUDED.embedding,
                crop_url = EXCLUDED.crop_url,
                detection_score = EXCLUDED.detection_score,
                updated_at = now()
            RETURNING id, photo_id, bbox_x, bbox_y, bbox_width, bbox_height
            ",
        );

        Ok(builder
            .build_query_as::<PersistedFaceKey>()
            .fetch_all(executor)
            .await?)
    }

    /// Clears the cluster assignment of the given faces.
    pub async fn reset_clusters(
        executor: impl Executor<'_, Database = Postgres>,
        face_ids: &[Uuid],
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE discovered_faces SET cluster_id = NULL, updated_at = now() WHERE id = ANY($1)",
        )
        .bind(face_ids)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Assigns one cluster id to a set of faces in a single statement.
    pub async fn assign_cluster(
        executor: impl Executor<'_, Database = Postgres>,
        cluster_id: &str,
        face_ids: &[Uuid],
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE discovered_faces SET cluster_id = $1, updated_at = now() WHERE id = ANY($2)",
        )
        .bind(cluster_id)
        .bind(face_ids)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_for_session(
        executor: impl Executor<'_, Database = Postgres>,
        session_id: Uuid,
    ) -> Result<Vec<DiscoveredFace>, DbError> {
        Ok(sqlx::query_as::<_, DiscoveredFace>(
            r"
            SELECT id, session_id, photo_id, embedding, crop_url, detection_score,
                   bbox_x, bbox_y, bbox_width, bbox_height, is_named, is_skipped,
                   cluster_id, created_at
            FROM discovered_faces
            WHERE session_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(session_id)
        .fetch_all(executor)
        .await?)
    }
}
