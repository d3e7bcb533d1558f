use crate::handlers::common::dbscan::{NOISE, dbscan};
use app_state::{ClusteringAlgorithm, ClusteringSettings};
use color_eyre::Result;
use common_services::database::{DbError, DiscoveredFaceRepository};
use common_types::FaceEmbedding;
use hdbscan::{DistanceMetric, Hdbscan, HdbscanHyperParams};
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

const NORM_EPSILON: f32 = 1e-12;

/// Scales every embedding to unit length. Zero vectors stay zero.
#[must_use]
pub fn normalize_embeddings(embeddings: &[Vec<f32>]) -> Vec<Vec<f32>> {
    embeddings
        .iter()
        .map(|embedding| {
            let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt() + NORM_EPSILON;
            embedding.iter().map(|v| v / norm).collect()
        })
        .collect()
}

/// Runs the HDBSCAN algorithm and returns one label per embedding, `-1` for noise.
pub fn run_hdbscan(
    embeddings: &[Vec<f32>],
    min_cluster_size: usize,
    min_samples: usize,
) -> Result<Vec<i32>> {
    let params = HdbscanHyperParams::builder()
        .min_cluster_size(min_cluster_size)
        .min_samples(min_samples)
        .allow_single_cluster(false)
        .dist_metric(DistanceMetric::Euclidean)
        .build();

    let clusterer = Hdbscan::new(embeddings, params);
    Ok(clusterer.cluster()?)
}

/// Labels the faces of one run. Labels line up with `faces`.
///
/// Below the minimum cluster size every face is noise. HDBSCAN errors fall back to DBSCAN.
#[must_use]
pub fn cluster_embeddings(faces: &[FaceEmbedding], settings: &ClusteringSettings) -> Vec<i32> {
    if faces.is_empty() {
        return Vec::new();
    }
    if faces.len() < settings.min_cluster_size {
        return vec![NOISE; faces.len()];
    }

    let raw: Vec<Vec<f32>> = faces.iter().map(|f| f.embedding.clone()).collect();
    let normalized = normalize_embeddings(&raw);

    match settings.algorithm {
        ClusteringAlgorithm::Hdbscan => {
            match run_hdbscan(&normalized, settings.min_cluster_size, settings.min_samples) {
                Ok(labels) => labels,
                Err(e) => {
                    warn!("HDBSCAN failed, falling back to DBSCAN: {}", e);
                    dbscan(&normalized, settings.dbscan_eps, settings.min_samples)
                }
            }
        }
        ClusteringAlgorithm::Dbscan => {
            dbscan(&normalized, settings.dbscan_eps, settings.min_samples)
        }
    }
}

#[must_use]
pub fn cluster_id(session_id: Uuid, label: i32) -> String {
    format!("cluster_{session_id}_{label}")
}

/// Groups face ids by label, skipping noise.
pub fn group_by_cluster(labels: &[i32], faces: &[FaceEmbedding]) -> BTreeMap<i32, Vec<Uuid>> {
    let mut clusters: BTreeMap<i32, Vec<Uuid>> = BTreeMap::new();
    for (&label, face) in labels.iter().zip(faces) {
        if label >= 0 {
            clusters.entry(label).or_default().push(face.face_id);
        }
    }
    clusters
}

/// Replaces the cluster assignments of this run's faces, one update per cluster.
///
/// Returns the number of clusters written.
pub async fn write_cluster_ids(
    repository: &dyn DiscoveredFaceRepository,
    session_id: Uuid,
    faces: &[FaceEmbedding],
    labels: &[i32],
) -> Result<usize, DbError> {
    if faces.is_empty() {
        return Ok(0);
    }

    let face_ids: Vec<Uuid> = faces.iter().map(|f| f.face_id).collect();
    repository.reset_clusters(&face_ids).await?;

    let clusters = group_by_cluster(labels, faces);
    for (label, ids) in &clusters {
        repository
            .assign_cluster(&cluster_id(session_id, *label), ids)
            .await?;
    }

    info!(
        "Wrote {} clusters for session {} ({} faces, {} noise)",
        clusters.len(),
        session_id,
        faces.len(),
        faces.len() - clusters.values().map(Vec::len).sum::<usize>()
    );
    Ok(clusters.len())
}
