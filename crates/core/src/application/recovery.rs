// Orphan recovery

use crate::domain::JobState;
use crate::error::Result;
use crate::port::{JobStore, ProcessControl, WorkerRegistry};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Resets `processing` rows abandoned by dead workers back to `pending`.
///
/// Runs at worker and supervisor startup. Rows held by a worker that still
/// has a live registry entry are left alone, so a starting worker never
/// steals a live peer's claim. `attempts` is preserved, which yields
/// at-least-once completion across crashes.
pub struct RecoveryService {
    store: Arc<dyn JobStore>,
    registry: Arc<dyn WorkerRegistry>,
    process: Arc<dyn ProcessControl>,
}

impl RecoveryService {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<dyn WorkerRegistry>,
        process: Arc<dyn ProcessControl>,
    ) -> Self {
        Self {
            store,
            registry,
            process,
        }
    }

    /// Reclaim orphaned jobs. Returns the number of rows reset.
    pub async fn recover_orphans(&self) -> Result<usize> {
        let live_workers: HashSet<String> = self
            .registry
            .entries()
            .await?
            .into_iter()
            .filter(|e| self.process.is_alive(e.pid))
            .map(|e| e.worker_id)
            .collect();

        let processing = self.store.list(Some(JobState::Processing)).await?;
        let mut recovered = 0;

        for job in processing {
            let held_by_live_worker = job
                .worker_id
                .as_ref()
                .is_some_and(|w| live_workers.contains(w));
            if held_by_live_worker {
                continue;
            }

            warn!(
                job_id = %job.id,
                worker_id = ?job.worker_id,
                attempts = job.attempts,
                "recovering orphaned job"
            );
            if self.store.release(&job.id).await? {
                recovered += 1;
            }
        }

        if recovered > 0 {
            info!(recovered, "orphaned job recovery complete");
        }
        Ok(recovered)
    }
}
