use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Corresponds to the '`face_jobs`' table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FaceJob {
    pub id: Uuid,
    pub session_id: Uuid,
    pub status: FaceJobStatus,
    pub progress: f64,
    pub message: Option<String>,
    pub error: Option<String>,
    pub photos_total: Option<i32>,
    pub photos_done: Option<i32>,
    pub faces_total: Option<i32>,
    /// Worker that currently holds the claim, if any.
    pub worker_id: Option<String>,
    /// Refreshed by the owning worker while the session runs.
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "face_job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FaceJobStatus {
    Queued,
    Running,
    Complete,
    Failed,
}

impl FaceJobStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// A partial update of a face job. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<FaceJobStatus>,
    pub progress: Option<f64>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub photos_total: Option<i32>,
    pub photos_done: Option<i32>,
    pub faces_total: Option<i32>,
}

impl JobPatch {
    #[must_use]
    pub fn progress(progress: f64, message: impl Into<String>) -> Self {
        Self {
            progress: Some(progress),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            status: Some(FaceJobStatus::Complete),
            progress: Some(1.0),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(FaceJobStatus::Failed),
            error: Some(error.into()),
            message: Some("Failed".to_owned()),
            ..Self::default()
        }
    }
}
