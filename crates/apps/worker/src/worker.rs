use crate::context::WorkerContext;
use crate::jobs::management::{ClaimOutcome, claim_next_job, handle_job};
use app_state::AppSettings;
use color_eyre::Result;
use common_services::utils::nice_id;
use sqlx::PgPool;
use tokio::time::sleep;
use tracing::info;

pub async fn create_worker(pool: PgPool, settings: AppSettings, stop_on_empty: bool) -> Result<()> {
    let worker_id = nice_id(8);
    info!(
        "🛠️ [Worker ID: {}] Starting (det_size={}, concurrency={}).",
        worker_id, settings.worker.det_size, settings.worker.photo_concurrency
    );
    let context = WorkerContext::new(pool, settings, worker_id)?;

    run_worker_loop(&context, stop_on_empty).await
}

/// The main loop for the worker process, continuously claiming and processing face jobs.
///
/// # Errors
///
/// This function will return an error if there is a problem communicating with the
/// store when claiming a job or recording its failure. The loop will terminate in such a case.
pub async fn run_worker_loop(context: &WorkerContext, stop_on_empty: bool) -> Result<()> {
    let mut sleeping = false;

    loop {
        match claim_next_job(context).await? {
            ClaimOutcome::Claimed(job) => {
                sleeping = false;
                info!("🐜 Picked up face job {} for session {}", job.id, job.session_id);
                handle_job(context, &job).await?;
            }
            // Someone else got it; there may be more work right behind it.
            ClaimOutcome::Lost => {}
            ClaimOutcome::Empty => {
                if !sleeping {
                    sleeping = true;
                    info!("💤 No jobs, going to sleep...");
                    if stop_on_empty {
                        return Ok(());
                    }
                }
                sleep(context.settings.worker.poll_interval).await;
            }
        }
    }
}
