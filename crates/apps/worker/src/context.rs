use crate::analyzer::{FaceAnalyzer, RemoteFaceAnalyzer};
use crate::fetcher::{HttpImageFetcher, ImageFetcher};
use app_state::AppSettings;
use color_eyre::Result;
use common_services::database::{
    DiscoveredFaceRepository, FaceJobRepository, PgRepository, PhotoRepository,
};
use common_services::storage::{CropStorage, ObjectStorageClient};
use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a worker needs to process sessions. Built once at startup and passed down.
pub struct WorkerContext {
    pub worker_id: String,
    pub settings: AppSettings,
    pub jobs: Arc<dyn FaceJobRepository>,
    pub photos: Arc<dyn PhotoRepository>,
    pub faces: Arc<dyn DiscoveredFaceRepository>,
    pub storage: Arc<dyn CropStorage>,
    pub analyzer: Arc<dyn FaceAnalyzer>,
    pub fetcher: Arc<dyn ImageFetcher>,
}

impl WorkerContext {
    /// Creates a new instance of `WorkerContext` backed by Postgres and HTTP services.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the storage URL is invalid.
    pub fn new(pool: PgPool, settings: AppSettings, worker_id: String) -> Result<Self> {
        let http_client = build_http_client(&settings)?;
        let repository = Arc::new(PgRepository::new(pool));
        let storage = ObjectStorageClient::new(
            http_client.clone(),
            &settings.storage,
            settings.secrets.storage_key.clone(),
        )?;
        let analyzer =
            RemoteFaceAnalyzer::new(http_client.clone(), &settings.analyzer, settings.worker.det_size);

        Ok(Self {
            worker_id,
            jobs: repository.clone(),
            photos: repository.clone(),
            faces: repository,
            storage: Arc::new(storage),
            analyzer: Arc::new(analyzer),
            fetcher: Arc::new(HttpImageFetcher::new(http_client)),
            settings,
        })
    }
}

/// One client for downloads, uploads and analysis, with enough idle connections for the upload pool.
fn build_http_client(settings: &AppSettings) -> Result<Client> {
    Ok(Client::builder()
        .pool_max_idle_per_host(settings.worker.photo_concurrency + 2)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(settings.worker.download_timeout)
        .build()?)
}
