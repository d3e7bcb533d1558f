use crate::database::{DbError, FaceJobStore};
use common_types::FaceJob;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

/// Enqueues a face job for a session.
///
/// If a queued or running job already exists for the session, that job is returned instead.
///
/// # Errors
///
/// Returns an error if the database transaction fails.
pub async fn enqueue_face_job(pool: &PgPool, session_id: Uuid) -> Result<FaceJob, DbError> {
    let mut tx = pool.begin().await?;

    if let Some(job) = FaceJobStore::insert_queued(&mut *tx, session_id).await? {
        tx.commit().await?;
        info!("Enqueued face job {} for session {}", job.id, session_id);
        return Ok(job);
    }

    let existing = FaceJobStore::find_active_for_session(&mut *tx, session_id).await?;
    tx.commit().await?;

    match existing {
        Some(job) => {
            warn!(
                "Not enqueueing face job for session {}, active job {} already exists.",
                session_id, job.id
            );
            Ok(job)
        }
        // The active job finished between the insert and the lookup.
        None => Err(DbError::Sqlx(sqlx::Error::RowNotFound)),
    }
}
