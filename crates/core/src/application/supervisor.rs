// Supervisor - worker pool lifecycle

use crate::application::worker::constants::{STOP_GRACE, STOP_POLL_INTERVAL};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, ProcessControl, TimeProvider, WorkerEntry, WorkerRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// A registry entry annotated with a PID liveness probe.
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub entry: WorkerEntry,
    pub alive: bool,
}

/// Spawns N worker subprocesses, persists their identities, forwards
/// shutdown, and garbage-collects dead registry entries.
pub struct Supervisor {
    registry: Arc<dyn WorkerRegistry>,
    process: Arc<dyn ProcessControl>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    stop_grace: Duration,
}

impl Supervisor {
    /// `stop_grace` overrides the default 30s stop window (tests use a short one).
    pub fn new(
        registry: Arc<dyn WorkerRegistry>,
        process: Arc<dyn ProcessControl>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        stop_grace: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            process,
            time_provider,
            id_provider,
            stop_grace: stop_grace.unwrap_or(STOP_GRACE),
        }
    }

    /// Start a pool of `count` workers. Refuses if live workers remain
    /// registered from a previous start.
    pub async fn start(&self, count: usize) -> Result<Vec<WorkerEntry>> {
        if count == 0 {
            return Err(AppError::Validation("worker count must be at least 1".to_string()));
        }

        let live = self.gc_dead_entries().await?;
        if !live.is_empty() {
            return Err(AppError::Conflict(format!(
                "worker pool already running ({} live worker(s)); stop it first",
                live.len()
            )));
        }

        let mut spawned = Vec::with_capacity(count);
        for _ in 0..count {
            let worker_id = self.id_provider.worker_id();
            let pid = self.process.spawn_worker(&worker_id).await?;
            let entry = WorkerEntry {
                worker_id: worker_id.clone(),
                pid,
                started_at: self.time_provider.now_millis(),
            };
            self.registry.register(&entry).await?;
            info!(worker_id = %worker_id, pid, "worker spawned");
            spawned.push(entry);
        }
        Ok(spawned)
    }

    /// Stop the pool: graceful shutdown, bounded grace window, force-kill
    /// stragglers, clear the registry. Returns the number of entries stopped.
    pub async fn stop(&self) -> Result<usize> {
        let entries = self.registry.entries().await?;
        if entries.is_empty() {
            return Err(AppError::NotFound("no worker pool is running".to_string()));
        }

        let mut waiting: Vec<WorkerEntry> = Vec::new();
        for entry in &entries {
            if self.process.is_alive(entry.pid) {
                self.process.terminate(entry.pid).await?;
                waiting.push(entry.clone());
            }
        }

        let deadline = Instant::now() + self.stop_grace;
        while !waiting.is_empty() && Instant::now() < deadline {
            waiting.retain(|e| self.process.is_alive(e.pid));
            if waiting.is_empty() {
                break;
            }
            sleep(STOP_POLL_INTERVAL).await;
        }

        for entry in &waiting {
            if self.process.is_alive(entry.pid) {
                warn!(worker_id = %entry.worker_id, pid = entry.pid, "worker did not exit in time, force-killing");
                self.process.kill(entry.pid).await?;
            }
        }

        self.registry.clear().await?;
        info!(stopped = entries.len(), "worker pool stopped");
        Ok(entries.len())
    }

    /// `stop()` followed by `start(count)`. A missing pool is not an error here.
    pub async fn restart(&self, count: usize) -> Result<Vec<WorkerEntry>> {
        match self.stop().await {
            Ok(_) | Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.start(count).await
    }

    /// Registry entries annotated with liveness. Dead entries are
    /// garbage-collected first.
    pub async fn status(&self) -> Result<Vec<WorkerStatus>> {
        let live = self.gc_dead_entries().await?;
        Ok(live
            .into_iter()
            .map(|entry| {
                let alive = self.process.is_alive(entry.pid);
                WorkerStatus { entry, alive }
            })
            .collect())
    }

    /// Drop registry entries whose PID is gone; returns the survivors.
    async fn gc_dead_entries(&self) -> Result<Vec<WorkerEntry>> {
        let mut live = Vec::new();
        for entry in self.registry.entries().await? {
            if self.process.is_alive(entry.pid) {
                live.push(entry);
            } else {
                warn!(worker_id = %entry.worker_id, pid = entry.pid, "removing dead worker from registry");
                self.registry.remove(&entry.worker_id).await?;
            }
        }
        Ok(live)
    }
}
