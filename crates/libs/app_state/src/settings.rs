use crate::{
    AnalyzerSettings, ClusteringSettings, CropSettings, DatabaseSettings, LoggingSettings,
    RawSettings, RawWorkerSettings, SecretSettings, StorageSettings,
};
use std::time::Duration;

const MAX_PHOTO_CONCURRENCY: usize = 16;

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub worker: WorkerSettings,
    pub crops: CropSettings,
    pub clustering: ClusteringSettings,
    pub analyzer: AnalyzerSettings,
    pub storage: StorageSettings,
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub secrets: SecretSettings,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub photo_concurrency: usize,
    pub det_size: u32,
    pub progress_update_interval: usize,
    pub upsert_batch_size: usize,
    pub photo_page_size: i64,
    pub photo_offset: i64,
    pub lease: Duration,
    pub heartbeat_interval: Duration,
    pub download_timeout: Duration,
}

impl From<RawWorkerSettings> for WorkerSettings {
    fn from(raw: RawWorkerSettings) -> Self {
        Self {
            poll_interval: Duration::from_secs_f64(raw.poll_interval_seconds.max(0.0)),
            photo_concurrency: raw.photo_concurrency.clamp(1, MAX_PHOTO_CONCURRENCY),
            det_size: raw.det_size,
            progress_update_interval: raw.progress_update_interval.max(1),
            upsert_batch_size: raw.upsert_batch_size.max(1),
            photo_page_size: raw.photo_page_size.max(1),
            photo_offset: raw.photo_offset.max(0),
            lease: Duration::from_secs(raw.lease_seconds),
            heartbeat_interval: Duration::from_secs(raw.heartbeat_seconds.max(1)),
            download_timeout: Duration::from_secs(raw.download_timeout_seconds),
        }
    }
}

impl From<RawSettings> for AppSettings {
    fn from(raw: RawSettings) -> Self {
        let mut clustering = raw.clustering;
        // Density clustering needs at least a pair to call anything a cluster.
        clustering.min_cluster_size = clustering.min_cluster_size.max(2);
        clustering.min_samples = clustering.min_samples.max(1);

        let mut crops = raw.crops;
        crops.quality = crops.quality.clamp(1, 100);
        crops.margin = crops.margin.max(0.0);

        Self {
            worker: raw.worker.into(),
            crops,
            clustering,
            analyzer: raw.analyzer,
            storage: raw.storage,
            database: raw.database,
            logging: raw.logging,
            secrets: raw.secrets,
        }
    }
}
