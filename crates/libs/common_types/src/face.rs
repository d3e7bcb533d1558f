use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Face bounding box in source image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Builds a box from its two corners. Inverted corners give a zero width/height.
    #[must_use]
    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x: x0,
            y: y0,
            width: (x1 - x0).max(0.0),
            height: (y1 - y0).max(0.0),
        }
    }
}

/// The uniqueness key of a discovered face: one record per photo and exact box.
///
/// Coordinates are compared bit-for-bit, the same way the store compares the
/// `double precision` key columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceKey {
    pub photo_id: Uuid,
    bbox_bits: [u64; 4],
}

impl FaceKey {
    #[must_use]
    pub fn new(photo_id: Uuid, bbox: &BoundingBox) -> Self {
        Self {
            photo_id,
            bbox_bits: [
                normalize_zero(bbox.x).to_bits(),
                normalize_zero(bbox.y).to_bits(),
                normalize_zero(bbox.width).to_bits(),
                normalize_zero(bbox.height).to_bits(),
            ],
        }
    }
}

// -0.0 and 0.0 are equal in Postgres, so they must hash the same here.
fn normalize_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

impl fmt::Display for FaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, w, h] = self.bbox_bits;
        write!(f, "{}:{x:016x}:{y:016x}:{w:016x}:{h:016x}", self.photo_id)
    }
}

/// Channel order expected by the face analysis capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Bgr,
    Rgb,
}

impl ChannelOrder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bgr => "bgr",
            Self::Rgb => "rgb",
        }
    }
}

/// A single face as returned by the analysis capability, before any post-processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    /// `[x0, y0, x1, y1]`
    pub bbox: [f32; 4],
    #[serde(default)]
    pub det_score: f32,
    pub embedding: Vec<f32>,
}

/// A detected face held in memory until its batch is flushed.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub photo_id: Uuid,
    pub bbox: BoundingBox,
    pub det_score: f32,
    pub embedding: Vec<f32>,
    /// Encoded crop image.
    pub crop: Vec<u8>,
    /// Set once the crop is uploaded.
    pub crop_url: Option<String>,
}

impl DetectedFace {
    #[must_use]
    pub fn key(&self) -> FaceKey {
        FaceKey::new(self.photo_id, &self.bbox)
    }
}

/// A persisted face id paired with its embedding, the input of clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEmbedding {
    pub face_id: Uuid,
    pub embedding: Vec<f32>,
}
