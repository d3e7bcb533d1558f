use crate::context::WorkerContext;
use crate::handlers::common::clustering::{cluster_embeddings, write_cluster_ids};
use crate::handlers::flush::BatchFlusher;
use crate::handlers::loader::load_session_photos;
use crate::handlers::photo::process_single_photo;
use crate::handlers::progress::ProgressReporter;
use color_eyre::Result;
use common_types::FaceJob;
use tracing::{info, warn};

/// Counters of one finished session run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub photos_total: usize,
    pub photos_skipped: usize,
    pub faces_total: usize,
    pub clusters: usize,
}

/// Detects, persists and clusters the faces of every photo in the job's session.
///
/// Photos are processed one at a time. A photo that cannot be downloaded, decoded or
/// analyzed is skipped and counted; anything else fails the whole session.
///
/// # Errors
///
/// Returns an error if the store rejects a read or write.
pub async fn process_session(context: &WorkerContext, job: &FaceJob) -> Result<SessionSummary> {
    let worker_settings = &context.settings.worker;
    let mut progress = ProgressReporter::new(
        context.jobs.as_ref(),
        job.id,
        worker_settings.progress_update_interval,
    );

    let photos = load_session_photos(
        context.photos.as_ref(),
        job.session_id,
        worker_settings.photo_offset,
        worker_settings.photo_page_size,
    )
    .await?;
    let photos_total = photos.len();
    progress.loaded(photos_total).await?;

    info!(
        "Processing {} photos for session {}",
        photos_total, job.session_id
    );
    progress.processing_started(photos_total).await?;

    let mut flusher = BatchFlusher::new(job.session_id, &context.settings);
    let mut photos_skipped = 0;
    for (idx, photo) in photos.iter().enumerate() {
        let outcome = process_single_photo(context, photo).await;
        if let Some(error) = &outcome.error {
            photos_skipped += 1;
            warn!("Skipping photo {}: {}", outcome.photo_id, error);
        }

        flusher.push_photo(outcome.faces);
        let photos_done = idx + 1;
        if flusher.should_flush(photos_done == photos_total) {
            flusher
                .flush(context.storage.as_ref(), context.faces.as_ref())
                .await?;
        }
        progress
            .photo_done(photos_done, photos_total, flusher.faces_total())
            .await?;
    }

    progress.clustering().await?;
    let embeddings = flusher.into_embeddings();
    let labels = cluster_embeddings(&embeddings, &context.settings.clustering);
    let clusters = write_cluster_ids(
        context.faces.as_ref(),
        job.session_id,
        &embeddings,
        &labels,
    )
    .await?;

    progress.complete(photos_skipped, embeddings.len()).await?;

    Ok(SessionSummary {
        photos_total,
        photos_skipped,
        faces_total: embeddings.len(),
        clusters,
    })
}
