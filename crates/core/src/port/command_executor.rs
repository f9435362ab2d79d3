// Command Executor Port
// Abstraction for running a single shell command to terminal outcome

use async_trait::async_trait;
use std::time::Duration;

/// Terminal outcome of one execution attempt.
///
/// Normal command failure is data, not an error: the report always comes back
/// and the worker maps it onto the store's `complete`/`fail` operations.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Exit status; None when the process never exited normally (timeout) or
    /// never started (spawn error).
    pub exit_code: Option<i32>,
    /// Captured stdout, byte-bounded with a truncation marker.
    pub stdout: String,
    /// Captured stderr, byte-bounded with a truncation marker.
    pub stderr: String,
    /// The command exceeded its wall-clock timeout and was terminated.
    pub timed_out: bool,
    /// The subprocess could not be started at all.
    pub spawn_error: Option<String>,
    pub duration_ms: i64,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.spawn_error.is_none() && self.exit_code == Some(0)
    }
}

/// Command Executor trait
///
/// Implementations:
/// - ShellExecutor: spawns the command via the host shell (production)
/// - MockCommandExecutor: scripted outcomes (tests)
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` through the host's standard shell with a hard wall-clock
    /// timeout, capturing bounded stdout/stderr.
    async fn execute(&self, command: &str, timeout: Duration) -> ExecutionReport;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit 0 with the given stdout
        Success(String),
        /// Non-zero exit with the given code and stderr
        FailExit(i32, String),
        /// Report a timeout
        Timeout,
        /// Report a spawn failure
        SpawnError(String),
    }

    /// Mock Command Executor for testing
    pub struct MockCommandExecutor {
        behavior: Arc<Mutex<MockBehavior>>,
        call_count: Arc<Mutex<usize>>,
    }

    impl MockCommandExecutor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                call_count: Arc::new(Mutex::new(0)),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success("mock output".to_string()))
        }

        pub fn new_fail(exit_code: i32, stderr: impl Into<String>) -> Self {
            Self::new(MockBehavior::FailExit(exit_code, stderr.into()))
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl CommandExecutor for MockCommandExecutor {
        async fn execute(&self, _command: &str, _timeout: Duration) -> ExecutionReport {
            *self.call_count.lock().unwrap() += 1;

            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                MockBehavior::Success(stdout) => ExecutionReport {
                    exit_code: Some(0),
                    stdout,
                    stderr: String::new(),
                    timed_out: false,
                    spawn_error: None,
                    duration_ms: 5,
                },
                MockBehavior::FailExit(code, stderr) => ExecutionReport {
                    exit_code: Some(code),
                    stdout: String::new(),
                    stderr,
                    timed_out: false,
                    spawn_error: None,
                    duration_ms: 5,
                },
                MockBehavior::Timeout => ExecutionReport {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    timed_out: true,
                    spawn_error: None,
                    duration_ms: 5,
                },
                MockBehavior::SpawnError(msg) => ExecutionReport {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    timed_out: false,
                    spawn_error: Some(msg),
                    duration_ms: 5,
                },
            }
        }
    }
}
