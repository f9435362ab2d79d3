// Enqueue Use Case

use crate::domain::{validate_priority, Job, JobId, DEFAULT_PRIORITY};
use crate::error::{AppError, Result};
use crate::port::time_provider::parse_local_datetime;
use crate::port::{ConfigStore, IdProvider, JobStore, TimeProvider};
use serde::Deserialize;
use tracing::info;

/// Enqueue request, deserialized from the CLI's JSON argument.
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueRequest {
    /// Explicit job id; absent means a generated UUID.
    #[serde(default)]
    pub id: Option<String>,
    pub command: String,
    /// 1 (high), 2 (normal, default) or 3 (low).
    #[serde(default)]
    pub priority: Option<i64>,
    /// Local wall-clock `YYYY-MM-DD HH:MM:SS`; absent means now.
    #[serde(default)]
    pub run_at: Option<String>,
}

/// Execute the enqueue use case: validate, snapshot config, insert.
pub async fn execute(
    store: &dyn JobStore,
    config: &dyn ConfigStore,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: EnqueueRequest,
) -> Result<JobId> {
    let now = time_provider.now_millis();
    let (command, priority, run_at) = validate_request(&req, now)?;

    let job_id = req.id.unwrap_or_else(|| id_provider.job_id());
    let max_retries = config.snapshot().await?.max_retries;

    let job = Job::new(job_id.clone(), command, priority, max_retries, run_at, now);
    store.insert(&job).await?;

    info!(job_id = %job_id, priority, run_at, "job enqueued");
    Ok(job_id)
}

/// Validate an enqueue request, resolving defaults.
fn validate_request(req: &EnqueueRequest, now: i64) -> Result<(String, i64, i64)> {
    let command = req.command.trim();
    if command.is_empty() {
        return Err(AppError::Validation("command cannot be empty".to_string()));
    }

    let priority = match req.priority {
        Some(p) => validate_priority(p)?,
        None => DEFAULT_PRIORITY,
    };

    let run_at = match &req.run_at {
        Some(s) => parse_local_datetime(s)?,
        None => now,
    };

    Ok((command.to_string(), priority, run_at))
}
