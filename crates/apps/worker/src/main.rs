use app_state::load_app_settings;
use clap::{Parser, Subcommand};
use color_eyre::Result;
use common_services::database::get_db_pool;
use common_services::job_queue::enqueue_face_job;
use face_worker::worker::create_worker;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the queue and process face jobs.
    Run {
        /// Exit once the queue is empty instead of sleeping.
        #[clap(long, default_value_t = false, action)]
        stop_on_empty: bool,
    },
    /// Queue a face job for a session, unless one is already queued or running.
    Enqueue {
        #[clap(long)]
        session_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = load_app_settings()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.level))?;
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    color_eyre::install()?;

    let command = Args::parse().command.unwrap_or(Command::Run {
        stop_on_empty: false,
    });
    let pool = get_db_pool(&settings.secrets.database_url, &settings.database, true).await?;

    match command {
        Command::Run { stop_on_empty } => create_worker(pool, settings, stop_on_empty).await?,
        Command::Enqueue { session_id } => {
            let job = enqueue_face_job(&pool, session_id).await?;
            info!("Face job {} is {:?} for session {}", job.id, job.status, session_id);
        }
    }

    Ok(())
}
