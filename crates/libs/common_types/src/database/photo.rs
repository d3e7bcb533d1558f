use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Corresponds to the 'photos' table. Read-only for the face worker.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Photo {
    pub id: Uuid,
    pub session_id: Uuid,
    pub thumbnail_url: Option<String>,
    pub original_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    /// The URL to run detection on: the thumbnail if present, the original otherwise.
    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        self.thumbnail_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.original_url.as_deref().filter(|u| !u.is_empty()))
    }
}
