use crate::database::DbError;
use common_types::{FaceJob, FaceJobStatus, JobPatch};
use sqlx::{Executor, Postgres};
use std::time::Duration;
use uuid::Uuid;

const FACE_JOB_COLUMNS: &str = "id, session_id, status, progress, message, error, photos_total, \
    photos_done, faces_total, worker_id, lease_expires_at, created_at, updated_at";

pub struct FaceJobStore;

impl FaceJobStore {
    /// Returns the oldest queued job, if any. Does not claim it.
    pub async fn fetch_oldest_queued(
        executor: impl Executor<'_, Database = Postgres>,
    ) -> Result<Option<FaceJob>, DbError> {
        let sql = format!(
            "SELECT {FACE_JOB_COLUMNS} FROM face_jobs \
             WHERE status = 'queued' ORDER BY created_at ASC LIMIT 1"
        );
        Ok(sqlx::query_as::<_, FaceJob>(&sql)
            .fetch_optional(executor)
            .await?)
    }

    pub async fn find_by_id(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: Uuid,
    ) -> Result<Option<FaceJob>, DbError> {
        let sql = format!("SELECT {FACE_JOB_COLUMNS} FROM face_jobs WHERE id = $1");
        Ok(sqlx::query_as::<_, FaceJob>(&sql)
            .bind(job_id)
            .fetch_optional(executor)
            .await?)
    }

    /// Moves a job from `queued` to `running`, only if it is still queued.
    ///
    /// Returns `true` for exactly one caller when several workers race on the same job.
    pub async fn claim(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: Uuid,
        worker_id: &str,
        lease: Duration,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"
            UPDATE face_jobs
            SET status = 'running',
                message = 'Starting...',
                progress = 0.01,
                worker_id = $2,
                lease_expires_at = now() + make_interval(secs => $3),
                updated_at = now()
            WHERE id = $1 AND status = 'queued'
            ",
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(lease.as_secs_f64())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Applies a partial update. Fields left `None` keep their current value.
    pub async fn update(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: Uuid,
        patch: &JobPatch,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"
            UPDATE face_jobs
            SET status = COALESCE($2, status),
                progress = COALESCE($3, progress),
                message = COALESCE($4, message),
                error = COALESCE($5, error),
                photos_total = COALESCE($6, photos_total),
                photos_done = COALESCE($7, photos_done),
                faces_total = COALESCE($8, faces_total),
                lease_expires_at = CASE WHEN $2 IN ('complete', 'failed') THEN NULL ELSE lease_expires_at END,
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(job_id)
        .bind(patch.status)
        .bind(patch.progress)
        .bind(patch.message.as_deref())
        .bind(patch.error.as_deref())
        .bind(patch.photos_total)
        .bind(patch.photos_done)
        .bind(patch.faces_total)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Pushes the lease of a running job forward. Returns `false` once the job is no longer running.
    pub async fn extend_lease(
        executor: impl Executor<'_, Database = Postgres>,
        job_id: Uuid,
        lease: Duration,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"
            UPDATE face_jobs
            SET lease_expires_at = now() + make_interval(secs => $2)
            WHERE id = $1 AND status = 'running'
            ",
        )
        .bind(job_id)
        .bind(lease.as_secs_f64())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Puts running jobs whose lease has run out back in the queue. Meant for an external reaper.
    pub async fn requeue_expired(
        executor: impl Executor<'_, Database = Postgres>,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            r"
            UPDATE face_jobs
            SET status = 'queued',
                worker_id = NULL,
                lease_expires_at = NULL,
                message = 'Requeued after lease expiry',
                updated_at = now()
            WHERE status = 'running' AND lease_expires_at < now()
            ",
        )
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Inserts a queued job for the session, unless an active one exists.
    ///
    /// Returns `None` when the active-session index rejected the insert.
    pub async fn insert_queued(
        executor: impl Executor<'_, Database = Postgres>,
        session_id: Uuid,
    ) -> Result<Option<FaceJob>, DbError> {
        let sql = format!(
            r"
            INSERT INTO face_jobs (session_id, status, progress, message)
            VALUES ($1, $2, 0, 'Queued')
            ON CONFLICT (session_id) WHERE status IN ('queued', 'running')
            DO NOTHING
            RETURNING {FACE_JOB_COLUMNS}
            "
        );
        Ok(sqlx::query_as::<_, FaceJob>(&sql)
            .bind(session_id)
            .bind(FaceJobStatus::Queued)
            .fetch_optional(executor)
            .await?)
    }

    pub async fn find_active_for_session(
        executor: impl Executor<'_, Database = Postgres>,
        session_id: Uuid,
    ) -> Result<Option<FaceJob>, DbError> {
        let sql = format!(
            "SELECT {FACE_JOB_COLUMNS} FROM face_jobs \
             WHERE session_id = $1 AND status IN ('queued', 'running') \
             ORDER BY created_at DESC LIMIT 1"
        );
        Ok(sqlx::query_as::<_, FaceJob>(&sql)
            .bind(session_id)
            .fetch_optional(executor)
            .await?)
    }
}
