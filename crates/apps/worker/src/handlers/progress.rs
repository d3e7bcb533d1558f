use common_services::database::{DbError, FaceJobRepository};
use common_types::JobPatch;
use uuid::Uuid;

pub const PROGRESS_CLAIMED: f64 = 0.01;
pub const PROGRESS_LOADED: f64 = 0.02;
pub const PROGRESS_PROCESSING: f64 = 0.05;
pub const PROGRESS_DETECTION_SPAN: f64 = 0.75;
pub const PROGRESS_CLUSTERING: f64 = 0.85;

/// Progress while detecting: `0.05` at the first photo up to `0.80` at the last.
#[must_use]
pub fn detection_progress(photos_done: usize, photos_total: usize) -> f64 {
    let ratio = photos_done as f64 / photos_total.max(1) as f64;
    PROGRESS_DETECTION_SPAN.mul_add(ratio.min(1.0), PROGRESS_PROCESSING)
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Writes throttled progress to a job. Progress written through it never goes down.
pub struct ProgressReporter<'a> {
    jobs: &'a dyn FaceJobRepository,
    job_id: Uuid,
    every: usize,
    last_progress: f64,
    last_reported_photos: usize,
}

impl<'a> ProgressReporter<'a> {
    #[must_use]
    pub fn new(jobs: &'a dyn FaceJobRepository, job_id: Uuid, every: usize) -> Self {
        Self {
            jobs,
            job_id,
            every: every.max(1),
            last_progress: PROGRESS_CLAIMED,
            last_reported_photos: 0,
        }
    }

    async fn write(&mut self, mut patch: JobPatch) -> Result<(), DbError> {
        if let Some(progress) = patch.progress {
            let progress = progress.clamp(0.0, 1.0).max(self.last_progress);
            self.last_progress = progress;
            patch.progress = Some(progress);
        }
        self.jobs.update(self.job_id, &patch).await
    }

    pub async fn loaded(&mut self, photos_total: usize) -> Result<(), DbError> {
        self.write(JobPatch {
            photos_total: Some(to_i32(photos_total)),
            photos_done: Some(0),
            faces_total: Some(0),
            ..JobPatch::progress(PROGRESS_LOADED, format!("Loaded {photos_total} photos"))
        })
        .await
    }

    pub async fn processing_started(&mut self, photos_total: usize) -> Result<(), DbError> {
        self.write(JobPatch::progress(
            PROGRESS_PROCESSING,
            format!("Processing {photos_total} photos..."),
        ))
        .await
    }

    /// Reports a processed photo. Only writes every N photos and on the last one.
    ///
    /// Returns whether anything was written.
    pub async fn photo_done(
        &mut self,
        photos_done: usize,
        photos_total: usize,
        faces_total: usize,
    ) -> Result<bool, DbError> {
        let is_last = photos_done >= photos_total;
        if photos_done.saturating_sub(self.last_reported_photos) < self.every && !is_last {
            return Ok(false);
        }

        self.write(JobPatch {
            photos_done: Some(to_i32(photos_done)),
            faces_total: Some(to_i32(faces_total)),
            ..JobPatch::progress(
                detection_progress(photos_done, photos_total),
                format!("Processed {photos_done}/{photos_total} photos"),
            )
        })
        .await?;
        self.last_reported_photos = photos_done;
        Ok(true)
    }

    pub async fn clustering(&mut self) -> Result<(), DbError> {
        self.write(JobPatch::progress(PROGRESS_CLUSTERING, "Clustering faces..."))
            .await
    }

    pub async fn complete(
        &mut self,
        photos_skipped: usize,
        faces_total: usize,
    ) -> Result<(), DbError> {
        let message = match photos_skipped {
            0 => "Complete".to_owned(),
            1 => "Complete (1 photo skipped)".to_owned(),
            n => format!("Complete ({n} photos skipped)"),
        };
        self.write(JobPatch {
            faces_total: Some(to_i32(faces_total)),
            ..JobPatch::complete(message)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryStore, queued_job};

    #[test]
    fn test_detection_progress_span() {
        assert!((detection_progress(0, 10) - 0.05).abs() < 1e-9);
        assert!((detection_progress(5, 10) - 0.425).abs() < 1e-9);
        assert!((detection_progress(10, 10) - 0.80).abs() < 1e-9);
        assert!((detection_progress(0, 0) - 0.05).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_updates_are_throttled() -> color_eyre::Result<()> {
        let store = MemoryStore::default();
        let job = queued_job(&store);
        let mut reporter = ProgressReporter::new(&store, job.id, 3);

        let mut written = Vec::new();
        for done in 1..=7 {
            written.push(reporter.photo_done(done, 7, 0).await?);
        }

        assert_eq!(
            written,
            vec![false, false, true, false, false, true, true]
        );
        assert_eq!(store.job(job.id)?.photos_done, Some(7));
        Ok(())
    }

    #[tokio::test]
    async fn test_progress_never_decreases() -> color_eyre::Result<()> {
        let store = MemoryStore::default();
        let job = queued_job(&store);
        let mut reporter = ProgressReporter::new(&store, job.id, 1);

        reporter.clustering().await?;
        reporter.processing_started(4).await?;

        assert!((store.job(job.id)?.progress - PROGRESS_CLUSTERING).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_mentions_skipped_photos() -> color_eyre::Result<()> {
        let store = MemoryStore::default();
        let job = queued_job(&store);
        let mut reporter = ProgressReporter::new(&store, job.id, 1);

        reporter.complete(2, 5).await?;

        let stored = store.job(job.id)?;
        assert_eq!(stored.message.as_deref(), Some("Complete (2 photos skipped)"));
        assert!((stored.progress - 1.0).abs() < f64::EPSILON);
        assert_eq!(stored.faces_total, Some(5));
        Ok(())
    }
}
