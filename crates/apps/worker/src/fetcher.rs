use async_trait::async_trait;
use color_eyre::Result;
use reqwest::Client;

/// Downloads the encoded bytes of a photo.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct HttpImageFetcher {
    http_client: Client,
}

impl HttpImageFetcher {
    #[must_use]
    pub const fn new(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http_client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
