use crate::{BoundingBox, FaceKey};
use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Corresponds to the '`discovered_faces`' table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DiscoveredFace {
    pub id: Uuid,
    pub session_id: Uuid,
    pub photo_id: Uuid,
    pub embedding: Vector,
    pub crop_url: String,
    pub detection_score: f32,
    pub bbox_x: f64,
    pub bbox_y: f64,
    pub bbox_width: f64,
    pub bbox_height: f64,
    pub is_named: bool,
    pub is_skipped: bool,
    pub cluster_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A face ready to be upserted. Only faces with an uploaded crop get this far.
#[derive(Debug, Clone)]
pub struct NewDiscoveredFace {
    pub session_id: Uuid,
    pub photo_id: Uuid,
    pub embedding: Vector,
    pub crop_url: String,
    pub detection_score: f32,
    pub bbox: BoundingBox,
}

impl NewDiscoveredFace {
    #[must_use]
    pub fn key(&self) -> FaceKey {
        FaceKey::new(self.photo_id, &self.bbox)
    }
}

/// Returned by the upsert: the written id together with its uniqueness key.
#[derive(Debug, Clone, FromRow)]
pub struct PersistedFaceKey {
    pub id: Uuid,
    pub photo_id: Uuid,
    pub bbox_x: f64,
    pub bbox_y: f64,
    pub bbox_width: f64,
    pub bbox_height: f64,
}

impl PersistedFaceKey {
    #[must_use]
    pub fn key(&self) -> FaceKey {
        FaceKey::new(
            self.photo_id,
            &BoundingBox {
                x: self.bbox_x,
                y: self.bbox_y,
                width: self.bbox_width,
                height: self.bbox_height,
            },
        )
    }
}
