// Job Store Port (Interface)

use crate::domain::{Job, JobId, JobState};
use crate::error::Result;
use async_trait::async_trait;

/// Everything the worker learned about a failed execution.
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Human-readable failure summary (timeout, spawn failure, non-zero exit).
    pub error: String,
    /// Non-retriable failure class: skips retry scheduling and goes straight
    /// to the DLQ regardless of remaining retries.
    pub fatal: bool,
}

/// Outcome of recording a failed execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    /// The job re-entered `pending` with a backoff delay.
    RetryScheduled { run_at: i64 },
    /// Retries exhausted (or a fatal failure); the job is in the DLQ.
    Dead,
}

/// Aggregate queue statistics.
#[derive(Debug, Clone, Default)]
pub struct QueueMetrics {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub dead: i64,
    /// completed / (completed + dead); None until a job reaches a terminal state.
    pub success_rate: Option<f64>,
    /// Mean attempts over terminal jobs; None until a job reaches a terminal state.
    pub average_attempts: Option<f64>,
    pub enqueued_last_24h: i64,
    pub finished_last_24h: i64,
}

/// Repository interface for job persistence and the claim protocol.
///
/// `claim` and `fail` are the contended paths and must be atomic: no two
/// concurrent claims may ever return the same row.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Atomically claim the single highest-priority eligible job for a
    /// worker, transitioning it to `processing`. Returns `None` when nothing
    /// is eligible or the race was lost.
    async fn claim(&self, worker_id: &str) -> Result<Option<Job>>;

    /// Record a successful execution. The job must be `processing`.
    async fn complete(&self, id: &JobId, stdout: &str, stderr: &str) -> Result<()>;

    /// Record a failed execution. The job must be `processing`. Reads
    /// `max-retries` and `backoff-base` live from the config table inside the
    /// same transaction and either schedules a retry or moves the job to the
    /// DLQ.
    async fn fail(&self, id: &JobId, report: &FailureReport) -> Result<FailOutcome>;

    /// Reset an orphaned `processing` row back to `pending`, preserving
    /// `attempts`. Returns false when the row was no longer `processing`.
    async fn release(&self, id: &JobId) -> Result<bool>;

    /// All jobs currently in the DLQ.
    async fn dead_letters(&self) -> Result<Vec<Job>>;

    /// Re-enqueue a DLQ job: `attempts` back to 0, `run_at` = now, error
    /// fields cleared. The job must be `dead`.
    async fn retry_dead(&self, id: &JobId) -> Result<()>;

    /// List jobs, optionally filtered by state, ordered by creation time.
    async fn list(&self, state: Option<JobState>) -> Result<Vec<Job>>;

    /// Count jobs in a given state
    async fn count_by_state(&self, state: JobState) -> Result<i64>;

    /// Aggregate queue statistics
    async fn metrics(&self) -> Result<QueueMetrics>;
}
