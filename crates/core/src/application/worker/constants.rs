// Worker constants

use std::time::Duration;

/// Sleep duration when no jobs are eligible. A scheduled job whose run_at has
/// arrived starts within this bound.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Sleep duration after a store error before the loop retries (1s)
pub const ERROR_RECOVERY_SLEEP: Duration = Duration::from_secs(1);

/// Consecutive store errors tolerated before the worker gives up and exits.
/// Transient lock contention clears well within this; a corrupted or
/// unreadable store does not.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Grace window between SIGTERM and SIGKILL for a timed-out job command (5s)
pub const TERM_GRACE: Duration = Duration::from_secs(5);

/// Grace window for workers to exit after a supervisor stop (30s)
pub const STOP_GRACE: Duration = Duration::from_secs(30);

/// Liveness poll interval while waiting out the stop grace window (200ms)
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(200);
