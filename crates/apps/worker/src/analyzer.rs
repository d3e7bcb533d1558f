use app_state::AnalyzerSettings;
use async_trait::async_trait;
use common_types::{ChannelOrder, RawDetection};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Analyzer request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Analyzer returned an error: {0}")]
    RemoteServerError(String),

    #[error("Pixel buffer is {actual} bytes, expected {expected}")]
    InvalidBuffer { expected: usize, actual: usize },
}

/// Packed 8-bit, 3-channel pixels in the order the analyzer asked for.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    #[must_use]
    pub const fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// The three channel values of a pixel, in buffer order.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.data.get(idx..idx + 3).map(|p| [p[0], p[1], p[2]])
    }
}

/// Face detection and embedding. Raw pixels in, zero or more faces out.
#[async_trait]
pub trait FaceAnalyzer: Send + Sync {
    fn channel_order(&self) -> ChannelOrder;

    async fn detect(&self, pixels: &PixelBuffer) -> Result<Vec<RawDetection>, AnalyzerError>;
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    faces: Vec<RawDetection>,
}

/// Talks to a face analysis service over HTTP.
///
/// The raw pixel buffer is posted as the body; dimensions, channel order and the
/// detection size hint travel in the query string.
#[derive(Clone)]
pub struct RemoteFaceAnalyzer {
    http_client: Client,
    url: String,
    channel_order: ChannelOrder,
    det_size: u32,
}

impl RemoteFaceAnalyzer {
    #[must_use]
    pub fn new(http_client: Client, settings: &AnalyzerSettings, det_size: u32) -> Self {
        Self {
            http_client,
            url: settings.url.clone(),
            channel_order: settings.channel_order,
            det_size,
        }
    }
}

#[async_trait]
impl FaceAnalyzer for RemoteFaceAnalyzer {
    fn channel_order(&self) -> ChannelOrder {
        self.channel_order
    }

    async fn detect(&self, pixels: &PixelBuffer) -> Result<Vec<RawDetection>, AnalyzerError> {
        if pixels.data.len() != pixels.expected_len() {
            return Err(AnalyzerError::InvalidBuffer {
                expected: pixels.expected_len(),
                actual: pixels.data.len(),
            });
        }

        let response = self
            .http_client
            .post(&self.url)
            .query(&[
                ("width", pixels.width.to_string()),
                ("height", pixels.height.to_string()),
                ("channels", pixels.order.as_str().to_owned()),
                ("det_size", self.det_size.to_string()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(pixels.data.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::RemoteServerError(format!(
                "{status}: {error_text}"
            )));
        }

        let body: DetectResponse = response.json().await?;
        debug!(
            "Analyzer found {} faces in {}x{} image",
            body.faces.len(),
            pixels.width,
            pixels.height
        );
        Ok(body.faces)
    }
}
