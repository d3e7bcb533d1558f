use app_state::AppSettings;
use common_services::database::{DbError, DiscoveredFaceRepository};
use common_services::storage::CropStorage;
use common_types::{DetectedFace, FaceEmbedding, FaceKey, NewDiscoveredFace};
use futures_util::{StreamExt, stream};
use pgvector::Vector;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use uuid::Uuid;

const CROP_CONTENT_TYPE: &str = "image/jpeg";

/// Flush once this many times the batch size of faces are waiting.
const PENDING_FACES_FACTOR: usize = 3;

/// Object path of a face crop. The same face always maps to the same path.
#[must_use]
pub fn crop_path(prefix: &str, session_id: Uuid, key: &FaceKey) -> String {
    let hash = blake3::hash(key.to_string().as_bytes()).to_hex();
    format!("{prefix}/{session_id}/{}.jpg", &hash[..32])
}

/// Collects detected faces across photos and persists them in batches.
///
/// Every persisted face ends up in the embedding list handed to clustering,
/// keyed by its row id so a face written twice is only clustered once.
pub struct BatchFlusher {
    session_id: Uuid,
    batch_size: usize,
    concurrency: usize,
    path_prefix: String,
    pending: Vec<DetectedFace>,
    photos_since_flush: usize,
    embeddings: Vec<FaceEmbedding>,
    positions: HashMap<Uuid, usize>,
}

impl BatchFlusher {
    #[must_use]
    pub fn new(session_id: Uuid, settings: &AppSettings) -> Self {
        Self {
            session_id,
            batch_size: settings.worker.upsert_batch_size,
            concurrency: settings.worker.photo_concurrency,
            path_prefix: settings.crops.path_prefix.clone(),
            pending: Vec::new(),
            photos_since_flush: 0,
            embeddings: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Adds the faces of one processed photo, even if it had none.
    pub fn push_photo(&mut self, faces: Vec<DetectedFace>) {
        self.pending.extend(faces);
        self.photos_since_flush += 1;
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn should_flush(&self, is_last_photo: bool) -> bool {
        !self.pending.is_empty()
            && (is_last_photo
                || self.pending.len() >= self.batch_size * PENDING_FACES_FACTOR
                || self.photos_since_flush >= self.batch_size)
    }

    /// Uploads the pending crops, upserts the faces that made it, and records their ids.
    ///
    /// A failed upload only drops that face. Returns how many faces were persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn flush(
        &mut self,
        storage: &dyn CropStorage,
        faces: &dyn DiscoveredFaceRepository,
    ) -> Result<usize, DbError> {
        let pending = std::mem::take(&mut self.pending);
        self.photos_since_flush = 0;

        let submitted = pending.len();
        let unique = dedupe_by_key(pending);
        let uploaded = self.upload_crops(storage, unique).await;
        if uploaded.is_empty() {
            debug!("Nothing to persist, all {} uploads failed", submitted);
            return Ok(0);
        }

        let rows: Vec<NewDiscoveredFace> = uploaded
            .iter()
            .filter_map(|face| {
                let crop_url = face.crop_url.clone()?;
                Some(NewDiscoveredFace {
                    session_id: self.session_id,
                    photo_id: face.photo_id,
                    embedding: Vector::from(face.embedding.clone()),
                    crop_url,
                    detection_score: face.det_score,
                    bbox: face.bbox,
                })
            })
            .collect();
        let persisted = faces.upsert_faces(&rows).await?;
        let ids: HashMap<FaceKey, Uuid> = persisted.iter().map(|row| (row.key(), row.id)).collect();

        let mut written = 0;
        for face in uploaded {
            let Some(&face_id) = ids.get(&face.key()) else {
                warn!("Upserted face on photo {} was not returned by the store", face.photo_id);
                continue;
            };
            self.record(face_id, face.embedding);
            written += 1;
        }

        debug!(
            "Flushed {} faces, {} persisted, {} known in session",
            submitted,
            written,
            self.embeddings.len()
        );
        Ok(written)
    }

    async fn upload_crops(
        &self,
        storage: &dyn CropStorage,
        faces: Vec<DetectedFace>,
    ) -> Vec<DetectedFace> {
        let prefix = self.path_prefix.as_str();
        let session_id = self.session_id;

        stream::iter(faces)
            .map(|mut face| async move {
                let path = crop_path(prefix, session_id, &face.key());
                let bytes = std::mem::take(&mut face.crop);
                match storage.put(&path, bytes, CROP_CONTENT_TYPE).await {
                    Ok(url) => {
                        face.crop_url = Some(url);
                        Some(face)
                    }
                    Err(e) => {
                        warn!("Dropping face on photo {}, crop upload failed: {}", face.photo_id, e);
                        None
                    }
                }
            })
            .buffered(self.concurrency)
            .filter_map(futures_util::future::ready)
            .collect()
            .await
    }

    fn record(&mut self, face_id: Uuid, embedding: Vec<f32>) {
        if let Some(&idx) = self.positions.get(&face_id) {
            self.embeddings[idx].embedding = embedding;
        } else {
            self.positions.insert(face_id, self.embeddings.len());
            self.embeddings.push(FaceEmbedding { face_id, embedding });
        }
    }

    /// Number of distinct faces persisted so far.
    #[must_use]
    pub fn faces_total(&self) -> usize {
        self.embeddings.len()
    }

    /// The persisted faces in the order they were first written.
    #[must_use]
    pub fn into_embeddings(self) -> Vec<FaceEmbedding> {
        self.embeddings
    }
}

// Postgres refuses to touch the same row twice in one ON CONFLICT DO UPDATE.
fn dedupe_by_key(faces: Vec<DetectedFace>) -> Vec<DetectedFace> {
    let mut seen = HashSet::new();
    faces
        .into_iter()
        .filter(|face| seen.insert(face.key()))
        .collect()
}
