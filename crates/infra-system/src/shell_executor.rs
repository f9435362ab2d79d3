// Shell executor implementation

use async_trait::async_trait;
use queuectl_core::application::worker::constants::TERM_GRACE;
use queuectl_core::port::{CommandExecutor, ExecutionReport, TimeProvider};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

/// Captured output is bounded per stream; the remainder is drained and
/// replaced by the marker.
const OUTPUT_CAP_BYTES: usize = 64 * 1024;
const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// A background grandchild can inherit the pipes and keep them open past the
/// command's own exit; the drain wait is bounded so execute() always returns.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Runs a single command through the host shell with a hard wall-clock
/// timeout. Normal command failure is reported, never raised.
pub struct ShellExecutor {
    time_provider: Arc<dyn TimeProvider>,
}

impl ShellExecutor {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { time_provider }
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str, limit: Duration) -> ExecutionReport {
        let started = self.time_provider.now_millis();

        info!(command = %command, timeout_secs = limit.as_secs(), "starting command");

        let mut child = match Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %command, error = %e, "failed to spawn command");
                return ExecutionReport {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    timed_out: false,
                    spawn_error: Some(e.to_string()),
                    duration_ms: self.time_provider.now_millis() - started,
                };
            }
        };

        let stdout_task = capture(child.stdout.take());
        let stderr_task = capture(child.stderr.take());

        let (status, timed_out) = match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => (Some(status), false),
            Ok(Err(e)) => {
                warn!(command = %command, error = %e, "failed waiting for command");
                (None, false)
            }
            Err(_) => {
                warn!(command = %command, timeout_secs = limit.as_secs(), "command timed out, terminating");
                terminate_child(&mut child).await;
                (None, true)
            }
        };

        // The pipes hit EOF once the child (or its killed remains) is gone
        let stdout = drain(stdout_task).await;
        let stderr = drain(stderr_task).await;
        let duration_ms = self.time_provider.now_millis() - started;

        let exit_code = status.and_then(|s| s.code());
        info!(
            command = %command,
            exit_code = ?exit_code,
            timed_out,
            duration_ms,
            "command finished"
        );

        ExecutionReport {
            exit_code,
            stdout,
            stderr,
            timed_out,
            spawn_error: None,
            duration_ms,
        }
    }
}

async fn drain(task: JoinHandle<String>) -> String {
    match timeout(PIPE_DRAIN_GRACE, task).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Read a pipe to EOF into a capped buffer.
fn capture<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut pipe) = pipe else {
            return String::new();
        };

        let mut buf: Vec<u8> = Vec::with_capacity(8 * 1024);
        let mut chunk = [0u8; 8 * 1024];
        let mut truncated = false;

        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    if buf.len() < OUTPUT_CAP_BYTES {
                        let take = n.min(OUTPUT_CAP_BYTES - buf.len());
                        buf.extend_from_slice(&chunk[..take]);
                        if take < n {
                            truncated = true;
                        }
                    } else {
                        // Keep draining so the child never blocks on a full pipe
                        truncated = true;
                    }
                }
                Err(_) => break,
            }
        }

        let mut output = String::from_utf8_lossy(&buf).into_owned();
        if truncated {
            output.push_str(TRUNCATION_MARKER);
        }
        output
    })
}

/// SIGTERM, a bounded grace wait, then SIGKILL.
async fn terminate_child(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            let pid = Pid::from_raw(pid as i32);
            if kill(pid, Signal::SIGTERM).is_ok()
                && timeout(TERM_GRACE, child.wait()).await.is_ok()
            {
                return;
            }
            warn!(pid = %pid, "process did not exit after SIGTERM, sending SIGKILL");
        }
    }

    let _ = child.start_kill();
    let _ = child.wait().await;
}
