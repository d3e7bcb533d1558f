use crate::database::{
    DbError, DiscoveredFaceRepository, DiscoveredFaceStore, FaceJobRepository, FaceJobStore,
    PhotoRepository, PhotoStore,
};
use async_trait::async_trait;
use common_types::{FaceJob, JobPatch, NewDiscoveredFace, PersistedFaceKey, Photo};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

/// Postgres-backed implementation of the worker's repositories, sharing one pool.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl FaceJobRepository for PgRepository {
    async fn fetch_one(&self) -> Result<Option<FaceJob>, DbError> {
        FaceJobStore::fetch_oldest_queued(&self.pool).await
    }

    async fn claim(
        &self,
        job_id: Uuid,
        worker_id: &str,
        lease: Duration,
    ) -> Result<bool, DbError> {
        FaceJobStore::claim(&self.pool, job_id, worker_id, lease).await
    }

    async fn update(&self, job_id: Uuid, patch: &JobPatch) -> Result<(), DbError> {
        FaceJobStore::update(&self.pool, job_id, patch).await
    }

    async fn extend_lease(&self, job_id: Uuid, lease: Duration) -> Result<bool, DbError> {
        FaceJobStore::extend_lease(&self.pool, job_id, lease).await
    }
}

#[async_trait]
impl PhotoRepository for PgRepository {
    async fn list_page(
        &self,
        session_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Photo>, DbError> {
        PhotoStore::list_page(&self.pool, session_id, offset, limit).await
    }
}

#[async_trait]
impl DiscoveredFaceRepository for PgRepository {
    async fn upsert_faces(
        &self,
        faces: &[NewDiscoveredFace],
    ) -> Result<Vec<PersistedFaceKey>, DbError> {
        DiscoveredFaceStore::upsert_batch(&self.pool, faces).await
    }

    async fn reset_clusters(&self, face_ids: &[Uuid]) -> Result<u64, DbError> {
        DiscoveredFaceStore::reset_clusters(&self.pool, face_ids).await
    }

    async fn assign_cluster(&self, cluster_id: &str, face_ids: &[Uuid]) -> Result<u64, DbError> {
        DiscoveredFaceStore::assign_cluster(&self.pool, cluster_id, face_ids).await
    }
}
