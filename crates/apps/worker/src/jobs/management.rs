use crate::context::WorkerContext;
use crate::handlers::session::process_session;
use crate::jobs::heartbeat::start_heartbeat_loop;
use color_eyre::Result;
use common_services::alert;
use common_types::{FaceJob, JobPatch};
use tracing::{error, info};

/// What a single poll of the queue produced.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// This worker now owns the job.
    Claimed(FaceJob),
    /// Another worker claimed the job first.
    Lost,
    Empty,
}

/// Fetches the oldest queued job and tries to claim it.
///
/// # Errors
///
/// Returns an error if the store cannot be reached.
pub async fn claim_next_job(context: &WorkerContext) -> Result<ClaimOutcome> {
    let Some(job) = context.jobs.fetch_one().await? else {
        return Ok(ClaimOutcome::Empty);
    };

    let claimed = context
        .jobs
        .claim(job.id, &context.worker_id, context.settings.worker.lease)
        .await?;
    if !claimed {
        info!("Job {} was claimed by another worker.", job.id);
        return Ok(ClaimOutcome::Lost);
    }

    Ok(ClaimOutcome::Claimed(job))
}

/// Runs a claimed job to completion and records failures on the job.
///
/// A failing session never escapes this function; only a failure to record the
/// failure itself does.
///
/// # Errors
///
/// Returns an error if the job cannot be marked as failed.
pub async fn handle_job(context: &WorkerContext, job: &FaceJob) -> Result<()> {
    let heartbeat_handle = start_heartbeat_loop(
        context.jobs.clone(),
        job.id,
        context.settings.worker.lease,
        context.settings.worker.heartbeat_interval,
    );

    let result = process_session(context, job).await;
    heartbeat_handle.abort();

    match result {
        Ok(summary) => {
            info!(
                "Finished session {}: {} photos, {} skipped, {} faces, {} clusters.",
                job.session_id,
                summary.photos_total,
                summary.photos_skipped,
                summary.faces_total,
                summary.clusters
            );
            Ok(())
        }
        Err(e) => {
            error!("Session {} failed: {:?}", job.session_id, e);
            update_job_on_failure(context, job, &e).await
        }
    }
}

async fn update_job_on_failure(
    context: &WorkerContext,
    job: &FaceJob,
    report: &color_eyre::Report,
) -> Result<()> {
    let error_string = format!("{report:#}");
    alert!("Marking job {} as failed: {}", job.id, error_string);
    context
        .jobs
        .update(job.id, &JobPatch::failed(error_string))
        .await?;
    Ok(())
}
