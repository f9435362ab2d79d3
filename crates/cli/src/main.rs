//! QueueCTL - command-line interface for the single-node job queue

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tabled::{Table, Tabled};
use tracing::info;

use queuectl_core::application::worker::{Shutdown, ShutdownHandle, Worker};
use queuectl_core::application::{RecoveryService, Supervisor};
use queuectl_core::domain::config::{validate_config_value, KNOWN_KEYS};
use queuectl_core::domain::{Job, JobState};
use queuectl_core::error::AppError;
use queuectl_core::port::id_provider::UuidProvider;
use queuectl_core::port::time_provider::{format_local_millis, SystemTimeProvider};
use queuectl_core::port::ConfigStore;
use queuectl_core::port::JobStore;
use queuectl_infra_sqlite::{
    create_pool, run_migrations, SqliteConfigStore, SqliteJobStore, SqliteWorkerRegistry,
};
use queuectl_infra_system::{ShellExecutor, SystemProcessControl};
use std::sync::Arc;

const DEFAULT_DB_PATH: &str = "queue.db";
const WORKER_LOG_PATH: &str = "worker.log";

#[derive(Parser)]
#[command(name = "queuectl")]
#[command(about = "Single-node background job queue", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the queue database
    #[arg(long, env = "QUEUECTL_DB_PATH", default_value = DEFAULT_DB_PATH, global = true)]
    db: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a job: '{"command": "...", "priority": 1|2|3, "run_at": "YYYY-MM-DD HH:MM:SS"}'
    Enqueue {
        /// Job description as a JSON object
        job_json: String,
    },

    /// List jobs
    List {
        /// Filter by state (pending, processing, completed, failed, dead)
        #[arg(long)]
        state: Option<String>,
    },

    /// Show the full record of one job, including captured output
    Job {
        job_id: String,
    },

    /// Manage the worker pool
    #[command(subcommand)]
    Worker(WorkerCommands),

    /// Inspect and re-enqueue dead-lettered jobs
    #[command(subcommand)]
    Dlq(DlqCommands),

    /// Show or change queue configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Queue statistics
    Metrics,

    /// Worker pool status plus queue depth
    Status,
}

#[derive(Subcommand)]
enum WorkerCommands {
    /// Start a pool of worker processes
    Start {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Gracefully stop the running pool
    Stop,
    /// Stop then start the pool
    Restart {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Show registered workers and their liveness
    Status,
    /// Internal: the worker loop entry point (spawned by `worker start`)
    #[command(hide = true)]
    Run {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum DlqCommands {
    /// List jobs in the dead letter queue
    List,
    /// Move a dead job back to pending with attempts reset
    Retry { job_id: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Set a configuration key (max-retries, backoff-base, job-timeout)
    Set { key: String, value: i64 },
}

/// Wired-up handles over one opened queue database.
struct App {
    store: Arc<SqliteJobStore>,
    config: Arc<SqliteConfigStore>,
    registry: Arc<SqliteWorkerRegistry>,
    process: Arc<SystemProcessControl>,
    time_provider: Arc<SystemTimeProvider>,
    id_provider: Arc<UuidProvider>,
}

impl App {
    async fn bootstrap(db: &str) -> Result<App> {
        let db_path = shellexpand::tilde(db).into_owned();
        let pool = create_pool(&db_path)
            .await
            .with_context(|| format!("failed to open {}", db_path))?;
        run_migrations(&pool).await.context("migration failed")?;

        let time_provider = Arc::new(SystemTimeProvider);
        Ok(App {
            store: Arc::new(SqliteJobStore::new(pool.clone(), time_provider.clone())),
            config: Arc::new(SqliteConfigStore::new(pool.clone())),
            registry: Arc::new(SqliteWorkerRegistry::new(pool)),
            process: Arc::new(SystemProcessControl::new(WORKER_LOG_PATH)),
            time_provider,
            id_provider: Arc::new(UuidProvider),
        })
    }

    fn supervisor(&self) -> Supervisor {
        Supervisor::new(
            self.registry.clone(),
            self.process.clone(),
            self.time_provider.clone(),
            self.id_provider.clone(),
            None,
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Worker(WorkerCommands::Run { id }) = &cli.command {
        return run_worker(&cli.db, id.clone()).await;
    }

    let app = App::bootstrap(&cli.db).await?;

    match cli.command {
        Commands::Enqueue { job_json } => cmd_enqueue(&app, &job_json).await,
        Commands::List { state } => cmd_list(&app, state.as_deref()).await,
        Commands::Job { job_id } => cmd_job(&app, &job_id).await,
        Commands::Worker(command) => match command {
            WorkerCommands::Start { count } => cmd_worker_start(&app, count).await,
            WorkerCommands::Stop => cmd_worker_stop(&app).await,
            WorkerCommands::Restart { count } => cmd_worker_restart(&app, count).await,
            WorkerCommands::Status => cmd_worker_status(&app).await,
            WorkerCommands::Run { .. } => unreachable!("handled above"),
        },
        Commands::Dlq(command) => match command {
            DlqCommands::List => cmd_dlq_list(&app).await,
            DlqCommands::Retry { job_id } => cmd_dlq_retry(&app, &job_id).await,
        },
        Commands::Config(command) => match command {
            ConfigCommands::Show => cmd_config_show(&app).await,
            ConfigCommands::Set { key, value } => cmd_config_set(&app, &key, value).await,
        },
        Commands::Metrics => cmd_metrics(&app).await,
        Commands::Status => cmd_status(&app).await,
    }
}

// ---------------------------------------------------------------------------
// Queue commands
// ---------------------------------------------------------------------------

async fn cmd_enqueue(app: &App, job_json: &str) -> Result<()> {
    let req: queuectl_core::application::EnqueueRequest =
        serde_json::from_str(job_json).context("invalid job JSON")?;

    let job_id = queuectl_core::application::enqueue::execute(
        app.store.as_ref(),
        app.config.as_ref(),
        app.id_provider.as_ref(),
        app.time_provider.as_ref(),
        req,
    )
    .await?;

    println!("{} Job enqueued: {}", "✓".green().bold(), job_id);
    Ok(())
}

#[derive(Tabled)]
struct JobListRow {
    id: String,
    command: String,
    state: String,
    attempts: String,
    run_at: String,
}

async fn cmd_list(app: &App, state: Option<&str>) -> Result<()> {
    let filter = parse_state_filter(state)?;
    let jobs = app.store.list(filter).await?;

    if jobs.is_empty() {
        match state {
            Some(s) => println!("No jobs with state '{}'", s),
            None => println!("no jobs in queue"),
        }
        return Ok(());
    }

    let rows: Vec<JobListRow> = jobs
        .iter()
        .map(|job| JobListRow {
            id: truncate(&job.id, 20),
            command: truncate(&job.command, 30),
            state: job.state.to_string(),
            attempts: format!("{}/{}", job.attempts, job.max_retries),
            run_at: format_local_millis(job.run_at),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}

async fn cmd_job(app: &App, job_id: &str) -> Result<()> {
    let job = app
        .store
        .find_by_id(&job_id.to_string())
        .await?
        .with_context(|| format!("job not found: {}", job_id))?;

    print_job_detail(&job);
    Ok(())
}

fn print_job_detail(job: &Job) {
    println!("{}", "Job".cyan().bold());
    println!();
    println!("  {} {}", "id:".bold(), job.id);
    println!("  {} {}", "command:".bold(), job.command);
    println!("  {} {}", "state:".bold(), state_colored(job.state));
    println!("  {} {}", "priority:".bold(), job.priority);
    println!("  {} {}/{}", "attempts:".bold(), job.attempts, job.max_retries);
    println!("  {} {}", "run_at:".bold(), format_local_millis(job.run_at));
    println!("  {} {}", "created_at:".bold(), format_local_millis(job.created_at));
    println!("  {} {}", "updated_at:".bold(), format_local_millis(job.updated_at));
    println!("  {} {}", "started_at:".bold(), opt_millis(job.started_at));
    println!("  {} {}", "finished_at:".bold(), opt_millis(job.finished_at));
    println!("  {} {}", "worker:".bold(), job.worker_id.as_deref().unwrap_or("-"));
    println!(
        "  {} {}",
        "exit code:".bold(),
        job.exit_code.map_or("-".to_string(), |c| c.to_string())
    );
    println!("  {} {}", "error:".bold(), job.error.as_deref().unwrap_or("-"));

    if let Some(stdout) = job.stdout.as_deref().filter(|s| !s.is_empty()) {
        println!();
        println!("{}", "--- stdout ---".bold());
        println!("{}", stdout);
    }
    if let Some(stderr) = job.stderr.as_deref().filter(|s| !s.is_empty()) {
        println!();
        println!("{}", "--- stderr ---".bold());
        println!("{}", stderr);
    }
}

// ---------------------------------------------------------------------------
// Worker pool commands
// ---------------------------------------------------------------------------

async fn cmd_worker_start(app: &App, count: usize) -> Result<()> {
    let spawned = app.supervisor().start(count).await?;
    println!(
        "{} Started {} worker(s) (logs: {})",
        "✓".green().bold(),
        spawned.len(),
        WORKER_LOG_PATH
    );
    Ok(())
}

async fn cmd_worker_stop(app: &App) -> Result<()> {
    let stopped = app.supervisor().stop().await?;
    println!("{} Stopped {} worker(s)", "✓".green().bold(), stopped);
    Ok(())
}

async fn cmd_worker_restart(app: &App, count: usize) -> Result<()> {
    let spawned = app.supervisor().restart(count).await?;
    println!(
        "{} Restarted pool with {} worker(s)",
        "✓".green().bold(),
        spawned.len()
    );
    Ok(())
}

#[derive(Tabled)]
struct WorkerStatusRow {
    worker_id: String,
    pid: i32,
    started_at: String,
    status: String,
}

async fn cmd_worker_status(app: &App) -> Result<()> {
    let statuses = app.supervisor().status().await?;

    if statuses.is_empty() {
        println!("no workers running");
        return Ok(());
    }

    let rows: Vec<WorkerStatusRow> = statuses
        .iter()
        .map(|s| WorkerStatusRow {
            worker_id: s.entry.worker_id.clone(),
            pid: s.entry.pid,
            started_at: format_local_millis(s.entry.started_at),
            status: if s.alive { "alive".to_string() } else { "dead".to_string() },
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}

/// The worker loop entry point, executed inside processes spawned by
/// `worker start`. Logs go to stderr, which the supervisor redirects into
/// worker.log.
async fn run_worker(db: &str, worker_id: String) -> Result<()> {
    init_worker_tracing();

    let app = App::bootstrap(db).await?;
    info!(worker_id = %worker_id, pid = std::process::id(), "worker process starting");

    // Rows orphaned by dead workers return to pending before this worker
    // starts claiming
    let recovery = RecoveryService::new(
        app.store.clone(),
        app.registry.clone(),
        app.process.clone(),
    );
    match recovery.recover_orphans().await {
        Ok(0) => {}
        Ok(recovered) => info!(recovered, "orphaned jobs recovered"),
        Err(e) => tracing::error!(error = %e, "orphan recovery failed"),
    }

    let (shutdown_handle, shutdown) = Shutdown::channel();
    spawn_signal_listener(shutdown_handle);

    let executor = Arc::new(ShellExecutor::new(app.time_provider.clone()));
    let worker = Worker::new(worker_id, app.store.clone(), app.config.clone(), executor);
    worker.run(shutdown).await?;

    info!("worker process exiting");
    Ok(())
}

fn init_worker_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_env("QUEUECTL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_ansi(false).with_target(false))
        .init();
}

fn spawn_signal_listener(shutdown_handle: ShutdownHandle) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = term.recv() => {},
                _ = tokio::signal::ctrl_c() => {},
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        info!("shutdown signal received");
        shutdown_handle.request();
    });
}

// ---------------------------------------------------------------------------
// DLQ commands
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct DlqRow {
    id: String,
    command: String,
    attempts: i32,
    error: String,
}

async fn cmd_dlq_list(app: &App) -> Result<()> {
    let jobs = app.store.dead_letters().await?;

    if jobs.is_empty() {
        println!("no jobs in dlq");
        return Ok(());
    }

    let rows: Vec<DlqRow> = jobs
        .iter()
        .map(|job| DlqRow {
            id: truncate(&job.id, 20),
            command: truncate(&job.command, 30),
            attempts: job.attempts,
            error: truncate(job.error.as_deref().unwrap_or(""), 30),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}

async fn cmd_dlq_retry(app: &App, job_id: &str) -> Result<()> {
    app.store.retry_dead(&job_id.to_string()).await?;
    println!("{} Job {} moved back to queue", "✓".green().bold(), job_id);
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_show(app: &App) -> Result<()> {
    let config = app.config.snapshot().await?;

    println!("{}", "current configuration:".cyan().bold());
    for key in KNOWN_KEYS {
        if let Some(value) = config.get(key) {
            println!("  {}: {}", key, value);
        }
    }
    Ok(())
}

async fn cmd_config_set(app: &App, key: &str, value: i64) -> Result<()> {
    validate_config_value(key, value)?;
    app.config.set(key, value).await?;
    println!("{} Set {} = {}", "✓".green().bold(), key, value);
    Ok(())
}

// ---------------------------------------------------------------------------
// Metrics and status
// ---------------------------------------------------------------------------

async fn cmd_metrics(app: &App) -> Result<()> {
    let metrics = app.store.metrics().await?;

    println!("{}", "Queue metrics".cyan().bold());
    println!();
    println!("  {} {}", "total jobs:".bold(), metrics.total);
    println!("  {} {}", "pending:".bold(), metrics.pending);
    println!("  {} {}", "processing:".bold(), metrics.processing);
    println!("  {} {}", "completed:".bold(), metrics.completed);
    println!("  {} {}", "dead:".bold(), metrics.dead);
    println!();
    match metrics.success_rate {
        Some(rate) => println!("  {} {:.1}%", "success rate:".bold(), rate * 100.0),
        None => println!("  {} n/a", "success rate:".bold()),
    }
    match metrics.average_attempts {
        Some(avg) => println!("  {} {:.2}", "average attempts:".bold(), avg),
        None => println!("  {} n/a", "average attempts:".bold()),
    }
    println!();
    println!("  {} {}", "enqueued last 24h:".bold(), metrics.enqueued_last_24h);
    println!("  {} {}", "finished last 24h:".bold(), metrics.finished_last_24h);
    Ok(())
}

async fn cmd_status(app: &App) -> Result<()> {
    cmd_worker_status(app).await?;

    let metrics = app.store.metrics().await?;
    println!();
    println!("{}", "job queue status:".cyan().bold());
    println!("  pending: {}", metrics.pending);
    println!("  processing: {}", metrics.processing);
    println!("  completed: {}", metrics.completed);
    println!("  dead: {}", metrics.dead);
    println!("  total: {}", metrics.total);
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

fn parse_state_filter(state: Option<&str>) -> Result<Option<JobState>> {
    match state {
        None => Ok(None),
        Some(s) => match JobState::parse(s) {
            Some(state) => Ok(Some(state)),
            None => bail!(AppError::Validation(format!(
                "unknown state '{}' (valid: pending, processing, completed, failed, dead)",
                s
            ))),
        },
    }
}

fn state_colored(state: JobState) -> colored::ColoredString {
    let s = state.to_string();
    match state {
        JobState::Pending => s.as_str().yellow(),
        JobState::Processing => s.as_str().cyan(),
        JobState::Completed => s.as_str().green(),
        JobState::Failed | JobState::Dead => s.as_str().red(),
    }
}

fn opt_millis(millis: Option<i64>) -> String {
    millis.map_or("-".to_string(), format_local_millis)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(2)).collect();
        format!("{}..", cut)
    }
}
