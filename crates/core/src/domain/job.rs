// Job Domain Model

use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = String;

/// Priority: 1 = high, 2 = normal, 3 = low
pub type Priority = i64;

pub const PRIORITY_HIGH: Priority = 1;
pub const DEFAULT_PRIORITY: Priority = 2;
pub const PRIORITY_LOW: Priority = 3;

/// Job State
///
/// `Failed` is a transient state: the store converts a failed execution into
/// either `Pending` (retry scheduled) or `Dead` within the same transaction,
/// so no persisted row is ever observable as `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl JobState {
    pub fn parse(s: &str) -> Option<JobState> {
        match s {
            "pending" => Some(JobState::Pending),
            "processing" => Some(JobState::Processing),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "dead" => Some(JobState::Dead),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Dead)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Processing => write!(f, "processing"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
            JobState::Dead => write!(f, "dead"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = crate::domain::error::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::parse(s).ok_or_else(|| crate::domain::error::DomainError::UnknownState(s.to_string()))
    }
}

/// Job Entity
///
/// All timestamps are epoch milliseconds obtained through a `TimeProvider`.
/// Conversion to/from local wall-clock strings happens at the CLI boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub command: String,
    pub state: JobState,
    pub priority: Priority,

    /// Execution attempts already made. Monotonically non-decreasing.
    pub attempts: i32,
    /// Snapshot of `max-retries` at insert time, refreshed to the live
    /// config value at each retry decision.
    pub max_retries: i64,

    /// Earliest time the job becomes eligible for a claim.
    pub run_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    /// Worker currently holding the claim. Set iff state is `Processing`.
    pub worker_id: Option<String>,

    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub error: Option<String>,
}

impl Job {
    /// Create a new pending job.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `command` - Shell command to execute
    /// * `priority` - 1 (high), 2 (normal) or 3 (low)
    /// * `max_retries` - Config snapshot at insert time
    /// * `run_at` - Earliest eligible time in epoch ms
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        command: impl Into<String>,
        priority: Priority,
        max_retries: i64,
        run_at: i64,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            state: JobState::Pending,
            priority,
            attempts: 0,
            max_retries,
            run_at,
            created_at,
            updated_at: created_at,
            started_at: None,
            finished_at: None,
            worker_id: None,
            exit_code: None,
            stdout: None,
            stderr: None,
            error: None,
        }
    }

    /// Transition to Processing, bound to a worker (the claim).
    pub fn start(&mut self, worker_id: impl Into<String>, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.state != JobState::Pending {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Processing.to_string(),
            });
        }
        self.state = JobState::Processing;
        self.worker_id = Some(worker_id.into());
        self.started_at = Some(now_millis);
        self.updated_at = now_millis;
        Ok(())
    }

    /// Transition to Completed.
    pub fn complete(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.state != JobState::Processing {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Completed.to_string(),
            });
        }
        self.state = JobState::Completed;
        self.exit_code = Some(0);
        self.worker_id = None;
        self.finished_at = Some(now_millis);
        self.updated_at = now_millis;
        Ok(())
    }

    /// Re-enter Pending with a future run_at (the retry-scheduling step).
    pub fn schedule_retry(&mut self, run_at: i64, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.state != JobState::Processing {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Pending.to_string(),
            });
        }
        self.state = JobState::Pending;
        self.attempts += 1;
        self.run_at = run_at;
        self.worker_id = None;
        self.started_at = None;
        self.updated_at = now_millis;
        Ok(())
    }

    /// Transition to Dead (DLQ entry).
    pub fn mark_dead(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.state != JobState::Processing {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Dead.to_string(),
            });
        }
        self.state = JobState::Dead;
        self.attempts += 1;
        self.worker_id = None;
        self.finished_at = Some(now_millis);
        self.updated_at = now_millis;
        Ok(())
    }
}

/// Validate a user-supplied priority value.
pub fn validate_priority(priority: i64) -> crate::domain::error::Result<Priority> {
    if (PRIORITY_HIGH..=PRIORITY_LOW).contains(&priority) {
        Ok(priority)
    } else {
        Err(crate::domain::error::DomainError::InvalidPriority(priority))
    }
}
