use common_types::ChannelOrder;
use serde::Deserialize;

/// Settings as they appear in `config/settings.yaml`, before validation.
#[derive(Debug, Deserialize, Clone)]
pub struct RawSettings {
    pub worker: RawWorkerSettings,
    pub crops: CropSettings,
    pub clustering: ClusteringSettings,
    pub analyzer: AnalyzerSettings,
    pub storage: StorageSettings,
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub secrets: SecretSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RawWorkerSettings {
    /// Sleep between polls when the queue is empty.
    pub poll_interval_seconds: f64,
    /// Size of the crop upload pool. Also sizes the HTTP connection pool.
    pub photo_concurrency: usize,
    /// Detection resolution hint forwarded to the analyzer.
    pub det_size: u32,
    /// Write progress to the job every N photos.
    pub progress_update_interval: usize,
    /// Flush pending faces every N photos.
    pub upsert_batch_size: usize,
    pub photo_page_size: i64,
    /// Skip the first N photos of a session, to resume a partial run.
    pub photo_offset: i64,
    pub lease_seconds: u64,
    pub heartbeat_seconds: u64,
    pub download_timeout_seconds: u64,
}

/// How face crops are cut and encoded.
#[derive(Debug, Deserialize, Clone)]
pub struct CropSettings {
    /// Margin added on each side, as a fraction of the box width/height.
    pub margin: f64,
    /// JPEG quality, `1..=100`.
    pub quality: u8,
    /// Object storage prefix for crops.
    pub path_prefix: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringAlgorithm {
    Hdbscan,
    Dbscan,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusteringSettings {
    pub algorithm: ClusteringAlgorithm,
    /// Sessions with fewer faces than this are not clustered at all.
    pub min_cluster_size: usize,
    pub min_samples: usize,
    /// Neighbourhood radius for DBSCAN, on L2-normalized embeddings.
    pub dbscan_eps: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyzerSettings {
    pub url: String,
    pub embedding_dim: usize,
    #[serde(default)]
    pub channel_order: ChannelOrder,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub url: String,
    pub bucket: String,
}

/// Database connection pool configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub max_connections: u32,
    pub min_connection: u32,
    pub max_lifetime: u64,
    pub idle_timeout: u64,
    pub acquire_timeout: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecretSettings {
    pub database_url: String,
    pub storage_key: String,
}
