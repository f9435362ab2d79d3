// Worker - job execution loop and cooperative shutdown

pub mod constants;

use constants::*;

use crate::error::Result;
use crate::port::{
    CommandExecutor, ConfigStore, ExecutionReport, FailOutcome, FailureReport, JobStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Supervisor-facing half of the shutdown flag: one `request` stops every
/// worker loop holding a matching [`Shutdown`].
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Ask the workers to stop once their current job's store update is
    /// written. A worker never abandons a claim it is still executing.
    pub fn request(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cooperative shutdown flag observed between claims by the worker loop.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// A fresh handle/flag pair for one worker pool.
    pub fn channel() -> (ShutdownHandle, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownHandle { tx }, Shutdown { rx })
    }

    pub fn requested(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn wait(&mut self) {
        let _ = self.rx.changed().await;
    }
}

/// A single-claim worker loop inside one OS process.
///
/// Holds at most one claim at a time: claim, execute, write the outcome back.
/// On shutdown the current job's store update completes before the loop exits.
pub struct Worker {
    id: String,
    store: Arc<dyn JobStore>,
    config: Arc<dyn ConfigStore>,
    executor: Arc<dyn CommandExecutor>,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        store: Arc<dyn JobStore>,
        config: Arc<dyn ConfigStore>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            id: id.into(),
            store,
            config,
            executor,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run the worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: Shutdown) -> Result<()> {
        info!(worker_id = %self.id, "worker started");
        let mut consecutive_errors: u32 = 0;
        loop {
            if shutdown.requested() {
                info!(worker_id = %self.id, "worker shutting down");
                break;
            }
            match self.process_next_job().await {
                Ok(processed) => {
                    consecutive_errors = 0;
                    if !processed {
                        // Nothing eligible, sleep briefly (or wait for shutdown)
                        tokio::select! {
                            _ = sleep(POLL_INTERVAL) => {},
                            _ = shutdown.wait() => {
                                info!(worker_id = %self.id, "worker interrupted during idle");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    error!(worker_id = %self.id, error = %e, consecutive_errors, "worker error");
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!(worker_id = %self.id, "store is persistently failing, giving up");
                        return Err(e);
                    }
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP) => {},
                        _ = shutdown.wait() => {
                            info!(worker_id = %self.id, "worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!(worker_id = %self.id, "worker stopped");
        Ok(())
    }

    /// Claim and execute the next eligible job (returns true if one was processed)
    pub async fn process_next_job(&self) -> Result<bool> {
        let job = match self.store.claim(&self.id).await? {
            Some(j) => j,
            None => return Ok(false),
        };

        // job-timeout is read at the start of each job so config changes take
        // effect without a worker restart
        let timeout = Duration::from_secs(self.config.snapshot().await?.job_timeout_secs.max(1) as u64);

        info!(
            worker_id = %self.id,
            job_id = %job.id,
            command = %job.command,
            attempt = job.attempts + 1,
            "processing job"
        );

        let report = self.executor.execute(&job.command, timeout).await;

        if report.succeeded() {
            self.store
                .complete(&job.id, &report.stdout, &report.stderr)
                .await?;
            info!(
                worker_id = %self.id,
                job_id = %job.id,
                duration_ms = report.duration_ms,
                "job completed"
            );
        } else {
            let failure = failure_report(&report);
            match self.store.fail(&job.id, &failure).await? {
                FailOutcome::RetryScheduled { run_at } => {
                    info!(
                        worker_id = %self.id,
                        job_id = %job.id,
                        error = %failure.error,
                        retry_at = run_at,
                        "job failed, retry scheduled"
                    );
                }
                FailOutcome::Dead => {
                    warn!(
                        worker_id = %self.id,
                        job_id = %job.id,
                        error = %failure.error,
                        "job moved to DLQ"
                    );
                }
            }
        }
        Ok(true)
    }
}

/// Map an execution report onto the store's failure vocabulary.
pub fn failure_report(report: &ExecutionReport) -> FailureReport {
    let (exit_code, error) = if let Some(msg) = &report.spawn_error {
        (Some(-1), msg.clone())
    } else if report.timed_out {
        (report.exit_code, "timeout".to_string())
    } else {
        let code = report.exit_code.unwrap_or(-1);
        let stderr = report.stderr.trim();
        let error = if stderr.is_empty() {
            format!("command failed (exit code {})", code)
        } else {
            stderr.to_string()
        };
        (report.exit_code, error)
    };

    FailureReport {
        exit_code,
        stdout: report.stdout.clone(),
        stderr: report.stderr.clone(),
        error,
        fatal: false,
    }
}
