//! In-memory stand-ins for the store, object storage, analyzer and photo host.

use crate::analyzer::{AnalyzerError, FaceAnalyzer, PixelBuffer};
use crate::context::WorkerContext;
use crate::fetcher::ImageFetcher;
use app_state::{
    AnalyzerSettings, AppSettings, ClusteringAlgorithm, ClusteringSettings, CropSettings,
    DatabaseSettings, LoggingSettings, SecretSettings, StorageSettings, WorkerSettings,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use color_eyre::eyre::eyre;
use common_services::database::{
    DbError, DiscoveredFaceRepository, FaceJobRepository, PhotoRepository,
};
use common_services::storage::{CropStorage, StorageError};
use common_services::utils::nice_id;
use common_types::{
    BoundingBox, ChannelOrder, FaceJob, FaceJobStatus, FaceKey, JobPatch, NewDiscoveredFace,
    PersistedFaceKey, Photo, RawDetection,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

pub const EMBEDDING_DIM: usize = 16;

pub fn test_settings() -> AppSettings {
    AppSettings {
        worker: WorkerSettings {
            poll_interval: Duration::from_millis(10),
            photo_concurrency: 3,
            det_size: 512,
            progress_update_interval: 3,
            upsert_batch_size: 10,
            photo_page_size: 1000,
            photo_offset: 0,
            lease: Duration::from_secs(300),
            heartbeat_interval: Duration::from_secs(60),
            download_timeout: Duration::from_secs(5),
        },
        crops: CropSettings {
            margin: 0.15,
            quality: 80,
            path_prefix: "faces".to_owned(),
        },
        clustering: ClusteringSettings {
            algorithm: ClusteringAlgorithm::Hdbscan,
            min_cluster_size: 3,
            min_samples: 3,
            dbscan_eps: 0.35,
        },
        analyzer: AnalyzerSettings {
            url: "http://analyzer.test/detect".to_owned(),
            embedding_dim: EMBEDDING_DIM,
            channel_order: ChannelOrder::Bgr,
        },
        storage: StorageSettings {
            url: "http://storage.test".to_owned(),
            bucket: "photos-originals".to_owned(),
        },
        database: DatabaseSettings {
            max_connections: 1,
            min_connection: 1,
            max_lifetime: 60,
            idle_timeout: 60,
            acquire_timeout: 5,
        },
        logging: LoggingSettings {
            level: "debug".to_owned(),
        },
        secrets: SecretSettings {
            database_url: "postgres://unused".to_owned(),
            storage_key: "key".to_owned(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct StoredFace {
    pub id: Uuid,
    pub session_id: Uuid,
    pub photo_id: Uuid,
    pub bbox: BoundingBox,
    pub embedding: Vec<f32>,
    pub crop_url: String,
    pub detection_score: f32,
    pub is_named: bool,
    pub cluster_id: Option<String>,
}

#[derive(Default)]
pub struct MemoryState {
    pub jobs: Vec<FaceJob>,
    pub photos: Vec<Photo>,
    pub faces: Vec<StoredFace>,
    /// Every patch written through the repository, in order.
    pub job_updates: Vec<JobPatch>,
    pub page_requests: Vec<(i64, i64)>,
    pub lease_extensions: usize,
    pub upsert_calls: usize,
    pub reverse_upsert_results: bool,
    pub fail_upserts: bool,
    pub fail_photo_listing: bool,
    ticks: i64,
}

impl MemoryState {
    // Strictly increasing timestamps, so creation order is unambiguous.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        DateTime::<Utc>::UNIX_EPOCH + ChronoDuration::milliseconds(self.ticks)
    }

    fn job_mut(&mut self, job_id: Uuid) -> Option<&mut FaceJob> {
        self.jobs.iter_mut().find(|job| job.id == job_id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store poisoned")
    }

    pub fn insert_photo(
        &self,
        session_id: Uuid,
        thumbnail_url: Option<String>,
        original_url: Option<String>,
    ) -> Photo {
        let mut state = self.state();
        let photo = Photo {
            id: Uuid::new_v4(),
            session_id,
            thumbnail_url,
            original_url,
            created_at: state.next_timestamp(),
        };
        state.photos.push(photo.clone());
        photo
    }

    pub fn job(&self, job_id: Uuid) -> color_eyre::Result<FaceJob> {
        self.state()
            .jobs
            .iter()
            .find(|job| job.id == job_id)
            .cloned()
            .ok_or_else(|| eyre!("no job {job_id}"))
    }

    pub fn force_status(&self, job_id: Uuid, status: FaceJobStatus) {
        if let Some(job) = self.state().job_mut(job_id) {
            job.status = status;
        }
    }

    /// Applies a patch the way the Postgres store does, without recording it.
    pub fn apply(&self, job_id: Uuid, patch: &JobPatch) {
        if let Some(job) = self.state().job_mut(job_id) {
            apply_patch(job, patch);
        }
    }

    pub fn mark_named(&self, face_id: Uuid) {
        if let Some(face) = self.state().faces.iter_mut().find(|f| f.id == face_id) {
            face.is_named = true;
        }
    }
}

fn apply_patch(job: &mut FaceJob, patch: &JobPatch) {
    if let Some(status) = patch.status {
        job.status = status;
        if status.is_terminal() {
            job.lease_expires_at = None;
        }
    }
    if let Some(progress) = patch.progress {
        job.progress = progress;
    }
    if let Some(message) = &patch.message {
        job.message = Some(message.clone());
    }
    if let Some(error) = &patch.error {
        job.error = Some(error.clone());
    }
    job.photos_total = patch.photos_total.or(job.photos_total);
    job.photos_done = patch.photos_done.or(job.photos_done);
    job.faces_total = patch.faces_total.or(job.faces_total);
}

pub fn queued_job(store: &MemoryStore) -> FaceJob {
    queued_job_for(store, Uuid::new_v4())
}

pub fn queued_job_for(store: &MemoryStore, session_id: Uuid) -> FaceJob {
    let mut state = store.state();
    let now = state.next_timestamp();
    let job = FaceJob {
        id: Uuid::new_v4(),
        session_id,
        status: FaceJobStatus::Queued,
        progress: 0.0,
        message: Some("Queued".to_owned()),
        error: None,
        photos_total: None,
        photos_done: None,
        faces_total: None,
        worker_id: None,
        lease_expires_at: None,
        created_at: now,
        updated_at: now,
    };
    state.jobs.push(job.clone());
    job
}

#[async_trait]
impl FaceJobRepository for MemoryStore {
    async fn fetch_one(&self) -> Result<Option<FaceJob>, DbError> {
        Ok(self
            .state()
            .jobs
            .iter()
            .filter(|job| job.status == FaceJobStatus::Queued)
            .min_by_key(|job| job.created_at)
            .cloned())
    }

    async fn claim(
        &self,
        job_id: Uuid,
        worker_id: &str,
        lease: Duration,
    ) -> Result<bool, DbError> {
        let mut state = self.state();
        let Some(job) = state.job_mut(job_id) else {
            return Ok(false);
        };
        if job.status != FaceJobStatus::Queued {
            return Ok(false);
        }
        job.status = FaceJobStatus::Running;
        job.message = Some("Starting...".to_owned());
        job.progress = 0.01;
        job.worker_id = Some(worker_id.to_owned());
        job.lease_expires_at = ChronoDuration::from_std(lease)
            .ok()
            .map(|lease| Utc::now() + lease);
        Ok(true)
    }

    async fn update(&self, job_id: Uuid, patch: &JobPatch) -> Result<(), DbError> {
        let mut state = self.state();
        state.job_updates.push(patch.clone());
        if let Some(job) = state.job_mut(job_id) {
            apply_patch(job, patch);
        }
        Ok(())
    }

    async fn extend_lease(&self, job_id: Uuid, _lease: Duration) -> Result<bool, DbError> {
        let mut state = self.state();
        let running = state
            .job_mut(job_id)
            .is_some_and(|job| job.status == FaceJobStatus::Running);
        if running {
            state.lease_extensions += 1;
        }
        Ok(running)
    }
}

#[async_trait]
impl PhotoRepository for MemoryStore {
    async fn list_page(
        &self,
        session_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Photo>, DbError> {
        let mut state = self.state();
        if state.fail_photo_listing {
            return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        state.page_requests.push((offset, limit));
        let mut photos: Vec<Photo> = state
            .photos
            .iter()
            .filter(|photo| photo.session_id == session_id)
            .cloned()
            .collect();
        photos.sort_by_key(|photo| (photo.created_at, photo.id));
        Ok(photos
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl DiscoveredFaceRepository for MemoryStore {
    async fn upsert_faces(
        &self,
        faces: &[NewDiscoveredFace],
    ) -> Result<Vec<PersistedFaceKey>, DbError> {
        let mut state = self.state();
        state.upsert_calls += 1;
        if state.fail_upserts {
            return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        }

        let mut returned = Vec::with_capacity(faces.len());
        for face in faces {
            let key = face.key();
            let existing = state
                .faces
                .iter()
                .position(|row| FaceKey::new(row.photo_id, &row.bbox) == key);
            let id = if let Some(idx) = existing {
                let row = &mut state.faces[idx];
                row.session_id = face.session_id;
                row.embedding = face.embedding.to_vec();
                row.crop_url = face.crop_url.clone();
                row.detection_score = face.detection_score;
                row.id
            } else {
                let id = Uuid::new_v4();
                state.faces.push(StoredFace {
                    id,
                    session_id: face.session_id,
                    photo_id: face.photo_id,
                    bbox: face.bbox,
                    embedding: face.embedding.to_vec(),
                    crop_url: face.crop_url.clone(),
                    detection_score: face.detection_score,
                    is_named: false,
                    cluster_id: None,
                });
                id
            };
            returned.push(PersistedFaceKey {
                id,
                photo_id: face.photo_id,
                bbox_x: face.bbox.x,
                bbox_y: face.bbox.y,
                bbox_width: face.bbox.width,
                bbox_height: face.bbox.height,
            });
        }

        if state.reverse_upsert_results {
            returned.reverse();
        }
        Ok(returned)
    }

    async fn reset_clusters(&self, face_ids: &[Uuid]) -> Result<u64, DbError> {
        let mut count = 0;
        for face in &mut self.state().faces {
            if face_ids.contains(&face.id) {
                face.cluster_id = None;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn assign_cluster(&self, cluster_id: &str, face_ids: &[Uuid]) -> Result<u64, DbError> {
        let mut count = 0;
        for face in &mut self.state().faces {
            if face_ids.contains(&face.id) {
                face.cluster_id = Some(cluster_id.to_owned());
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Object storage that keeps crops in memory. Can be told to fail the first N uploads.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failures_left: AtomicUsize,
}

impl MemoryStorage {
    pub fn failing_first(n: usize) -> Self {
        Self {
            objects: Mutex::default(),
            failures_left: AtomicUsize::new(n),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().expect("storage poisoned").len()
    }
}

#[async_trait]
impl CropStorage for MemoryStorage {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StorageError::RemoteServerError("unavailable".to_owned()));
        }
        self.objects
            .lock()
            .expect("storage poisoned")
            .insert(path.to_owned(), bytes);
        Ok(format!("memory://{path}"))
    }
}

/// Reads the person and variant of a synthetic photo from its top-left pixel.
///
/// Red is the person (0 means nobody is in the photo) and green the variant.
/// Each person gets an embedding along their own axis, nudged by the variant.
pub struct FakeAnalyzer {
    order: ChannelOrder,
}

#[async_trait]
impl FaceAnalyzer for FakeAnalyzer {
    fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    async fn detect(&self, pixels: &PixelBuffer) -> Result<Vec<RawDetection>, AnalyzerError> {
        let Some(px) = pixels.pixel(0, 0) else {
            return Ok(Vec::new());
        };
        let [red, green, _] = match pixels.order {
            ChannelOrder::Bgr => [px[2], px[1], px[0]],
            ChannelOrder::Rgb => px,
        };
        if red == 0 {
            return Ok(Vec::new());
        }

        let person = usize::from(red);
        let mut embedding = vec![0.0; EMBEDDING_DIM];
        embedding[(person - 1) % EMBEDDING_DIM] = 1.0;
        embedding[person % EMBEDDING_DIM] += 0.02 * f32::from(green);
        Ok(vec![RawDetection {
            bbox: [16.0, 16.0, 48.0, 48.0],
            det_score: 0.9,
            embedding,
        }])
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeFetcher {
    pub fn insert(&self, url: &str, bytes: Vec<u8>) {
        self.files
            .lock()
            .expect("fetcher poisoned")
            .insert(url.to_owned(), bytes);
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> color_eyre::Result<Vec<u8>> {
        self.files
            .lock()
            .expect("fetcher poisoned")
            .get(url)
            .cloned()
            .ok_or_else(|| eyre!("connection refused: {url}"))
    }
}

pub fn face_photo_png(person: u8, variant: u8) -> Vec<u8> {
    let image = RgbImage::from_pixel(64, 64, Rgb([person, variant, 200]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("png encoding");
    buf
}

/// A worker context wired to in-memory fakes.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub storage: Arc<MemoryStorage>,
    pub fetcher: Arc<FakeFetcher>,
    persons: Mutex<HashMap<Uuid, u8>>,
    pub context: WorkerContext,
}

impl TestHarness {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self::with_settings(store, test_settings())
    }

    pub fn with_settings(store: Arc<MemoryStore>, settings: AppSettings) -> Self {
        let storage = Arc::new(MemoryStorage::default());
        let fetcher = Arc::new(FakeFetcher::default());
        let analyzer = FakeAnalyzer {
            order: settings.analyzer.channel_order,
        };
        let context = WorkerContext {
            worker_id: nice_id(8),
            settings,
            jobs: store.clone(),
            photos: store.clone(),
            faces: store.clone(),
            storage: storage.clone(),
            analyzer: Arc::new(analyzer),
            fetcher: fetcher.clone(),
        };
        Self {
            store,
            storage,
            fetcher,
            persons: Mutex::default(),
            context,
        }
    }

    /// Adds a photo showing `person` (0 for an empty photo) to the session.
    pub fn add_face_photo(&self, session_id: Uuid, person: u8, variant: u8) -> Photo {
        let url = format!("http://photos.test/{}.png", Uuid::new_v4());
        self.fetcher.insert(&url, face_photo_png(person, variant));
        let photo = self.store.insert_photo(session_id, Some(url), None);
        self.persons
            .lock()
            .expect("persons poisoned")
            .insert(photo.id, person);
        photo
    }

    pub fn add_unreachable_photo(&self, session_id: Uuid) -> Photo {
        let url = format!("http://unreachable.test/{}.png", Uuid::new_v4());
        self.store.insert_photo(session_id, None, Some(url))
    }

    pub fn person_of(&self, photo_id: Uuid) -> Option<u8> {
        self.persons
            .lock()
            .expect("persons poisoned")
            .get(&photo_id)
            .copied()
    }
}
