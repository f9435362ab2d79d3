// SQLite JobStore Implementation

use async_trait::async_trait;
use queuectl_core::application::retry::{RetryDecision, RetryPolicy};
use queuectl_core::domain::config::{KEY_BACKOFF_BASE, KEY_MAX_RETRIES};
use queuectl_core::domain::{Job, JobId, JobState, QueueConfig};
use queuectl_core::error::{AppError, Result};
use queuectl_core::port::{FailOutcome, FailureReport, JobStore, QueueMetrics, TimeProvider};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::sync::Arc;

use crate::map_sqlx_error;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub struct SqliteJobStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Live config value read inside the `fail` transaction, so a
    /// `config set` takes effect at the very next retry decision.
    async fn config_value(
        tx: &mut Transaction<'_, Sqlite>,
        key: &str,
        default: i64,
    ) -> Result<i64> {
        let value: Option<i64> = sqlx::query_scalar("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(value.unwrap_or(default))
    }

    /// NotFound / InvalidState error for a guarded update that matched no row.
    async fn state_guard_error(&self, id: &JobId, wanted: JobState) -> AppError {
        let current: std::result::Result<Option<String>, _> =
            sqlx::query_scalar("SELECT state FROM jobs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;

        match current {
            Ok(None) => AppError::NotFound(format!("job {} not found", id)),
            Ok(Some(state)) => AppError::InvalidState(format!(
                "job {} is {} (expected {})",
                id, state, wanted
            )),
            Err(e) => map_sqlx_error(e),
        }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, command, state, priority,
                attempts, max_retries,
                run_at, created_at, updated_at, started_at, finished_at,
                worker_id, exit_code, stdout, stderr, error
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.command)
        .bind(job.state.to_string())
        .bind(job.priority)
        .bind(job.attempts)
        .bind(job.max_retries)
        .bind(job.run_at)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.worker_id)
        .bind(job.exit_code)
        .bind(&job.stdout)
        .bind(&job.stderr)
        .bind(&job.error)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(JobRow::into_job))
    }

    async fn claim(&self, worker_id: &str) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();

        // Selection and transition run as one statement; the repeated
        // state = 'pending' predicate on the outer UPDATE makes a racing
        // loser observe no row instead of double-dispatching.
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = ?, worker_id = ?, started_at = ?, updated_at = ?
            WHERE id = (
                SELECT id FROM jobs
                WHERE state = ? AND run_at <= ?
                ORDER BY priority ASC, run_at ASC, created_at ASC, id ASC
                LIMIT 1
            ) AND state = ?
            RETURNING *
            "#,
        )
        .bind(JobState::Processing.to_string())
        .bind(worker_id)
        .bind(now)
        .bind(now)
        .bind(JobState::Pending.to_string())
        .bind(now)
        .bind(JobState::Pending.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(JobRow::into_job))
    }

    async fn complete(&self, id: &JobId, stdout: &str, stderr: &str) -> Result<()> {
        let now = self.time_provider.now_millis();

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, finished_at = ?, updated_at = ?,
                exit_code = 0, stdout = ?, stderr = ?, error = NULL,
                worker_id = NULL
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(JobState::Completed.to_string())
        .bind(now)
        .bind(now)
        .bind(stdout)
        .bind(stderr)
        .bind(id)
        .bind(JobState::Processing.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.state_guard_error(id, JobState::Processing).await);
        }
        Ok(())
    }

    async fn fail(&self, id: &JobId, report: &FailureReport) -> Result<FailOutcome> {
        let now = self.time_provider.now_millis();
        let defaults = QueueConfig::default();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(AppError::NotFound(format!("job {} not found", id)));
        };
        if row.state != JobState::Processing.to_string() {
            return Err(AppError::InvalidState(format!(
                "job {} is {} (expected processing)",
                id, row.state
            )));
        }

        let attempts = row.attempts + 1;
        let max_retries =
            Self::config_value(&mut tx, KEY_MAX_RETRIES, defaults.max_retries).await?;
        let backoff_base =
            Self::config_value(&mut tx, KEY_BACKOFF_BASE, defaults.backoff_base).await?;

        let outcome = match RetryPolicy::decide(attempts, max_retries, backoff_base, report.fatal) {
            RetryDecision::Dead => {
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET state = ?, attempts = ?, max_retries = ?,
                        finished_at = ?, updated_at = ?, worker_id = NULL,
                        exit_code = ?, stdout = ?, stderr = ?, error = ?
                    WHERE id = ?
                    "#,
                )
                .bind(JobState::Dead.to_string())
                .bind(attempts)
                .bind(max_retries)
                .bind(now)
                .bind(now)
                .bind(report.exit_code)
                .bind(&report.stdout)
                .bind(&report.stderr)
                .bind(&report.error)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

                FailOutcome::Dead
            }
            RetryDecision::RetryAfter(delay) => {
                let run_at = now + (delay.as_millis() as i64).min(DAY_MS);
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET state = ?, attempts = ?, max_retries = ?,
                        run_at = ?, updated_at = ?,
                        worker_id = NULL, started_at = NULL,
                        exit_code = ?, stdout = ?, stderr = ?, error = ?
                    WHERE id = ?
                    "#,
                )
                .bind(JobState::Pending.to_string())
                .bind(attempts)
                .bind(max_retries)
                .bind(run_at)
                .bind(now)
                .bind(report.exit_code)
                .bind(&report.stdout)
                .bind(&report.stderr)
                .bind(&report.error)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

                FailOutcome::RetryScheduled { run_at }
            }
        };

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(outcome)
    }

    async fn release(&self, id: &JobId) -> Result<bool> {
        let now = self.time_provider.now_millis();

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, worker_id = NULL, started_at = NULL, updated_at = ?
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(JobState::Pending.to_string())
        .bind(now)
        .bind(id)
        .bind(JobState::Processing.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn dead_letters(&self) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT * FROM jobs WHERE state = ? ORDER BY finished_at ASC, created_at ASC",
        )
        .bind(JobState::Dead.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(JobRow::into_job).collect())
    }

    async fn retry_dead(&self, id: &JobId) -> Result<()> {
        let now = self.time_provider.now_millis();

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, attempts = 0, run_at = ?, updated_at = ?,
                started_at = NULL, finished_at = NULL, worker_id = NULL,
                exit_code = NULL, stdout = NULL, stderr = NULL, error = NULL
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(JobState::Pending.to_string())
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(JobState::Dead.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.state_guard_error(id, JobState::Dead).await);
        }
        Ok(())
    }

    async fn list(&self, state: Option<JobState>) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = match state {
            Some(state) => {
                sqlx::query_as("SELECT * FROM jobs WHERE state = ? ORDER BY created_at ASC, id ASC")
                    .bind(state.to_string())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as("SELECT * FROM jobs ORDER BY created_at ASC, id ASC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(JobRow::into_job).collect())
    }

    async fn count_by_state(&self, state: JobState) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE state = ?")
            .bind(state.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn metrics(&self) -> Result<QueueMetrics> {
        let now = self.time_provider.now_millis();
        let cutoff = now - DAY_MS;

        let counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM jobs GROUP BY state")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        let mut metrics = QueueMetrics::default();
        for (state, count) in counts {
            metrics.total += count;
            match JobState::parse(&state) {
                Some(JobState::Pending) => metrics.pending = count,
                Some(JobState::Processing) => metrics.processing = count,
                Some(JobState::Completed) => metrics.completed = count,
                Some(JobState::Dead) => metrics.dead = count,
                _ => {}
            }
        }

        let terminal = metrics.completed + metrics.dead;
        if terminal > 0 {
            metrics.success_rate = Some(metrics.completed as f64 / terminal as f64);

            metrics.average_attempts = sqlx::query_scalar(
                "SELECT AVG(attempts) FROM jobs WHERE state IN ('completed', 'dead')",
            )
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        }

        metrics.enqueued_last_24h =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE created_at >= ?")
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        metrics.finished_last_24h = sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE finished_at IS NOT NULL AND finished_at >= ?",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(metrics)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    command: String,
    state: String,
    priority: i64,
    attempts: i32,
    max_retries: i64,
    run_at: i64,
    created_at: i64,
    updated_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    worker_id: Option<String>,
    exit_code: Option<i32>,
    stdout: Option<String>,
    stderr: Option<String>,
    error: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Job {
        // An unparseable state column means a corrupted row; surface it as
        // dead rather than silently re-running the command.
        let state = JobState::parse(&self.state).unwrap_or(JobState::Dead);

        Job {
            id: self.id,
            command: self.command,
            state,
            priority: self.priority,
            attempts: self.attempts,
            max_retries: self.max_retries,
            run_at: self.run_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            worker_id: self.worker_id,
            exit_code: self.exit_code,
            stdout: self.stdout,
            stderr: self.stderr,
            error: self.error,
        }
    }
}
