use super::CropStorage;
use super::error::StorageError;
use app_state::StorageSettings;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Uploads objects to a bucket over the storage REST API.
#[derive(Clone)]
pub struct ObjectStorageClient {
    http_client: Client,
    base_url: Url,
    bucket: String,
    key: String,
}

impl ObjectStorageClient {
    pub fn new(
        http_client: Client,
        settings: &StorageSettings,
        key: impl Into<String>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            http_client,
            base_url: settings.url.parse()?,
            bucket: settings.bucket.clone(),
            key: key.into(),
        })
    }

    fn object_url(&self, path: &str) -> Result<Url, StorageError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(format!("{base}/storage/v1/object/{}/{path}", self.bucket).parse()?)
    }

    /// The publicly readable URL of an object in the bucket.
    pub fn public_url(&self, path: &str) -> Result<Url, StorageError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(format!("{base}/storage/v1/object/public/{}/{path}", self.bucket).parse()?)
    }
}

#[async_trait]
impl CropStorage for ObjectStorageClient {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let url = self.object_url(path)?;
        debug!("Uploading {} bytes to {url}", bytes.len());

        let response = self
            .http_client
            .post(url.clone())
            .bearer_auth(&self.key)
            .header("apikey", &self.key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(StorageError::RemoteServerError(format!(
                "Upload to {url} failed with {status}: {error_text}"
            )));
        }

        Ok(self.public_url(path)?.to_string())
    }
}
