// Process control implementation - worker subprocess lifecycle

use async_trait::async_trait;
use queuectl_core::error::{AppError, Result};
use queuectl_core::port::ProcessControl;
use std::path::PathBuf;
use std::process::Stdio;
use tracing::info;

/// Spawns detached worker processes by re-executing the current binary with
/// the internal `worker run` subcommand, and signals them by PID.
pub struct SystemProcessControl {
    log_path: PathBuf,
}

impl SystemProcessControl {
    /// `log_path` receives the spawned workers' stdout/stderr (append mode).
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }
}

#[async_trait]
impl ProcessControl for SystemProcessControl {
    async fn spawn_worker(&self, worker_id: &str) -> Result<i32> {
        let exe = std::env::current_exe()?;
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        let log_err = log.try_clone()?;

        let child = std::process::Command::new(exe)
            .args(["worker", "run", "--id", worker_id])
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .spawn()?;

        let pid = child.id() as i32;
        info!(worker_id = %worker_id, pid, log = %self.log_path.display(), "spawned worker process");
        Ok(pid)
    }

    async fn terminate(&self, pid: i32) -> Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            kill(Pid::from_raw(pid), Signal::SIGTERM)
                .map_err(|e| AppError::Internal(format!("SIGTERM to pid {} failed: {}", pid, e)))?;
            Ok(())
        }

        #[cfg(not(unix))]
        {
            // No reliable graceful-signal semantics: force-kill immediately
            self.kill(pid).await
        }
    }

    async fn kill(&self, pid: i32) -> Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            kill(Pid::from_raw(pid), Signal::SIGKILL)
                .map_err(|e| AppError::Internal(format!("SIGKILL to pid {} failed: {}", pid, e)))?;
            Ok(())
        }

        #[cfg(not(unix))]
        {
            let output = std::process::Command::new("taskkill")
                .args(["/F", "/PID", &pid.to_string()])
                .output()?;

            if !output.status.success() {
                return Err(AppError::Internal(format!(
                    "taskkill failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                )));
            }
            Ok(())
        }
    }

    fn is_alive(&self, pid: i32) -> bool {
        #[cfg(unix)]
        {
            use nix::sys::signal::kill;
            use nix::unistd::Pid;

            // Signal 0 checks existence without sending anything
            kill(Pid::from_raw(pid), None).is_ok()
        }

        #[cfg(not(unix))]
        {
            let output = std::process::Command::new("tasklist")
                .args(["/FI", &format!("PID eq {}", pid), "/NH"])
                .output();

            match output {
                Ok(output) => String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()),
                Err(_) => false,
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn control() -> SystemProcessControl {
        SystemProcessControl::new("/tmp/queuectl_test_worker.log")
    }

    #[tokio::test]
    async fn test_is_alive_for_own_process() {
        assert!(control().is_alive(std::process::id() as i32));
    }

    #[tokio::test]
    async fn test_is_alive_false_for_bogus_pid() {
        assert!(!control().is_alive(999_999));
    }

    #[tokio::test]
    async fn test_terminate_stops_child() {
        let child = std::process::Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id() as i32;

        let control = control();
        assert!(control.is_alive(pid));
        control.terminate(pid).await.unwrap();

        // Reap and verify the process is gone
        let mut child = child;
        for _ in 0..50 {
            if child.try_wait().unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(child.try_wait().unwrap().is_some(), "child should have exited");
    }
}
