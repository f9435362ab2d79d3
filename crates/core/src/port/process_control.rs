// Process Control Port
// Abstraction over spawning and signalling worker OS processes

use crate::error::Result;
use async_trait::async_trait;

/// Process Control trait
///
/// Implementations:
/// - SystemProcessControl: real OS processes and signals (production)
/// - MockProcessControl: a fake process table (tests)
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Spawn a detached worker process and return its OS PID.
    async fn spawn_worker(&self, worker_id: &str) -> Result<i32>;

    /// Request graceful shutdown (SIGTERM on POSIX).
    async fn terminate(&self, pid: i32) -> Result<()>;

    /// Force-kill (SIGKILL on POSIX).
    async fn kill(&self, pid: i32) -> Result<()>;

    /// Check whether a PID is live.
    fn is_alive(&self, pid: i32) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Mutex;

    /// Mock process table for supervisor and recovery tests.
    pub struct MockProcessControl {
        alive: Mutex<HashSet<i32>>,
        next_pid: AtomicI32,
        /// When true, SIGTERM is ignored and only kill() removes the process.
        ignore_terminate: bool,
        terminated: Mutex<Vec<i32>>,
        killed: Mutex<Vec<i32>>,
    }

    impl MockProcessControl {
        pub fn new() -> Self {
            Self {
                alive: Mutex::new(HashSet::new()),
                next_pid: AtomicI32::new(1000),
                ignore_terminate: false,
                terminated: Mutex::new(Vec::new()),
                killed: Mutex::new(Vec::new()),
            }
        }

        /// A process table whose processes refuse SIGTERM.
        pub fn new_stubborn() -> Self {
            Self {
                ignore_terminate: true,
                ..Self::new()
            }
        }

        pub fn terminated_pids(&self) -> Vec<i32> {
            self.terminated.lock().unwrap().clone()
        }

        pub fn killed_pids(&self) -> Vec<i32> {
            self.killed.lock().unwrap().clone()
        }

        /// Simulate a crash: drop a PID from the table without any signal.
        pub fn crash(&self, pid: i32) {
            self.alive.lock().unwrap().remove(&pid);
        }
    }

    impl Default for MockProcessControl {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProcessControl for MockProcessControl {
        async fn spawn_worker(&self, _worker_id: &str) -> Result<i32> {
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            self.alive.lock().unwrap().insert(pid);
            Ok(pid)
        }

        async fn terminate(&self, pid: i32) -> Result<()> {
            self.terminated.lock().unwrap().push(pid);
            if !self.ignore_terminate {
                self.alive.lock().unwrap().remove(&pid);
            }
            Ok(())
        }

        async fn kill(&self, pid: i32) -> Result<()> {
            self.killed.lock().unwrap().push(pid);
            self.alive.lock().unwrap().remove(&pid);
            Ok(())
        }

        fn is_alive(&self, pid: i32) -> bool {
            self.alive.lock().unwrap().contains(&pid)
        }
    }
}
