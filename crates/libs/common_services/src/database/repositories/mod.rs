mod postgres;

pub use postgres::PgRepository;

use crate::database::DbError;
use async_trait::async_trait;
use common_types::{FaceJob, JobPatch, NewDiscoveredFace, PersistedFaceKey, Photo};
use std::time::Duration;
use uuid::Uuid;

/// Queue and lifecycle operations on face jobs.
#[async_trait]
pub trait FaceJobRepository: Send + Sync {
    /// The oldest queued job, or `None` when the queue is empty.
    async fn fetch_one(&self) -> Result<Option<FaceJob>, DbError>;

    /// Compare-and-swap `queued -> running`. Only one concurrent caller gets `true`.
    async fn claim(&self, job_id: Uuid, worker_id: &str, lease: Duration)
    -> Result<bool, DbError>;

    async fn update(&self, job_id: Uuid, patch: &JobPatch) -> Result<(), DbError>;

    /// Returns `false` when the job is no longer running and the lease should not be renewed.
    async fn extend_lease(&self, job_id: Uuid, lease: Duration) -> Result<bool, DbError>;
}

#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// One page of a session's photos in creation order.
    async fn list_page(
        &self,
        session_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Photo>, DbError>;
}

#[async_trait]
pub trait DiscoveredFaceRepository: Send + Sync {
    /// Idempotent upsert keyed on `(photo_id, bbox)`, returning the key of every written row.
    async fn upsert_faces(
        &self,
        faces: &[NewDiscoveredFace],
    ) -> Result<Vec<PersistedFaceKey>, DbError>;

    async fn reset_clusters(&self, face_ids: &[Uuid]) -> Result<u64, DbError>;

    async fn assign_cluster(&self, cluster_id: &str, face_ids: &[Uuid]) -> Result<u64, DbError>;
}
