use crate::analyzer::PixelBuffer;
use crate::context::WorkerContext;
use app_state::CropSettings;
use common_types::{BoundingBox, ChannelOrder, DetectedFace, Photo, RawDetection};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use thiserror::Error;
use uuid::Uuid;

/// Why a photo produced no faces. None of these fail the session.
#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("Photo has no thumbnail or original URL")]
    MissingSource,

    #[error("Download failed: {0}")]
    DownloadFailure(String),

    #[error("Decode failed: {0}")]
    DecodeFailure(String),

    #[error("Detection failed: {0}")]
    DetectionFailure(String),
}

/// Result of running detection on one photo.
#[derive(Debug)]
pub struct PhotoOutcome {
    pub photo_id: Uuid,
    pub faces: Vec<DetectedFace>,
    pub error: Option<PhotoError>,
}

/// Downloads a photo, detects faces and cuts an encoded crop for each.
///
/// Never fails: any problem is reported in [`PhotoOutcome::error`] with no faces.
pub async fn process_single_photo(context: &WorkerContext, photo: &Photo) -> PhotoOutcome {
    match detect_faces(context, photo).await {
        Ok(faces) => PhotoOutcome {
            photo_id: photo.id,
            faces,
            error: None,
        },
        Err(error) => PhotoOutcome {
            photo_id: photo.id,
            faces: Vec::new(),
            error: Some(error),
        },
    }
}

async fn detect_faces(
    context: &WorkerContext,
    photo: &Photo,
) -> Result<Vec<DetectedFace>, PhotoError> {
    let url = photo.source_url().ok_or(PhotoError::MissingSource)?;
    let bytes = context
        .fetcher
        .fetch(url)
        .await
        .map_err(|e| PhotoError::DownloadFailure(format!("{e:#}")))?;

    let image = tokio::task::spawn_blocking(move || decode_rgb(&bytes))
        .await
        .map_err(|e| PhotoError::DecodeFailure(e.to_string()))??;

    let pixels = to_pixel_buffer(&image, context.analyzer.channel_order());
    let detections = context
        .analyzer
        .detect(&pixels)
        .await
        .map_err(|e| PhotoError::DetectionFailure(e.to_string()))?;
    drop(pixels);

    let expected_dim = context.settings.analyzer.embedding_dim;
    if let Some(bad) = detections.iter().find(|d| d.embedding.len() != expected_dim) {
        return Err(PhotoError::DetectionFailure(format!(
            "embedding has {} dimensions, expected {expected_dim}",
            bad.embedding.len()
        )));
    }

    let crop_settings = context.settings.crops.clone();
    let photo_id = photo.id;
    tokio::task::spawn_blocking(move || build_faces(&image, photo_id, detections, &crop_settings))
        .await
        .map_err(|e| PhotoError::DecodeFailure(e.to_string()))?
}

fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PhotoError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| PhotoError::DecodeFailure(e.to_string()))?
        .to_rgb8();
    if image.width() == 0 || image.height() == 0 {
        return Err(PhotoError::DecodeFailure("image is empty".to_owned()));
    }
    Ok(image)
}

/// Packs an RGB image into the channel order the analyzer expects.
#[must_use]
pub fn to_pixel_buffer(image: &RgbImage, order: ChannelOrder) -> PixelBuffer {
    let mut data = image.as_raw().clone();
    if order == ChannelOrder::Bgr {
        for pixel in data.chunks_exact_mut(3) {
            pixel.swap(0, 2);
        }
    }
    PixelBuffer {
        width: image.width(),
        height: image.height(),
        order,
        data,
    }
}

fn build_faces(
    image: &RgbImage,
    photo_id: Uuid,
    detections: Vec<RawDetection>,
    settings: &CropSettings,
) -> Result<Vec<DetectedFace>, PhotoError> {
    detections
        .into_iter()
        .map(|detection| {
            let [x0, y0, x1, y1] = detection.bbox.map(f64::from);
            let bbox = BoundingBox::from_corners(x0, y0, x1, y1);
            let crop = crop_face(image, &bbox, settings.margin);
            Ok(DetectedFace {
                photo_id,
                bbox,
                det_score: detection.det_score,
                embedding: detection.embedding,
                crop: encode_jpeg(&crop, settings.quality)?,
                crop_url: None,
            })
        })
        .collect()
}

/// Cuts the box out of the image, grown by `margin` times its size on every side.
///
/// The region is clamped to the image and is always at least one pixel.
#[must_use]
pub fn crop_face(image: &RgbImage, bbox: &BoundingBox, margin: f64) -> RgbImage {
    let (width, height) = (image.width(), image.height());
    let mx = bbox.width * margin;
    let my = bbox.height * margin;

    let x0 = clamp_coord(bbox.x - mx, width.saturating_sub(1));
    let y0 = clamp_coord(bbox.y - my, height.saturating_sub(1));
    let x1 = clamp_coord(bbox.x + bbox.width + mx, width).max(x0 + 1);
    let y1 = clamp_coord(bbox.y + bbox.height + my, height).max(y0 + 1);

    image::imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image()
}

// Truncates toward zero, then clamps into `0..=max`.
fn clamp_coord(value: f64, max: u32) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.trunc().clamp(0.0, f64::from(max)) as u32
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, PhotoError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(image)
        .map_err(|e| PhotoError::DecodeFailure(format!("crop encoding failed: {e}")))?;
    Ok(buf)
}
