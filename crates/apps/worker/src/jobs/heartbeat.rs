use common_services::database::FaceJobRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

/// Spawns a background task that keeps pushing the lease of a running job forward.
///
/// The task stops on its own once the job is no longer running, or when the store
/// cannot be reached. Abort the handle when the session finishes.
#[must_use]
pub fn start_heartbeat_loop(
    jobs: Arc<dyn FaceJobRepository>,
    job_id: Uuid,
    lease: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately and the claim has just set the lease.
        interval.tick().await;
        loop {
            interval.tick().await;
            match jobs.extend_lease(job_id, lease).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!("Heartbeat for job {} failed, stopping: {}", job_id, e);
                    break;
                }
            }
        }
    })
}
