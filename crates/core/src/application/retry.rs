// Retry decision logic

use std::time::Duration;
use tracing::warn;

/// Backoff delays are capped at one day so a misconfigured base cannot park
/// a job in the far future.
const MAX_BACKOFF_SECS: u64 = 24 * 60 * 60;

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enter pending after the backoff delay
    RetryAfter(Duration),
    /// Retries exhausted (or a fatal failure); move to the DLQ
    Dead,
}

/// Retry policy
///
/// `max_retries` counts retries *after* the first attempt: a value of 3
/// permits up to 4 total executions. `attempts` is the count including the
/// execution that just failed.
pub struct RetryPolicy;

impl RetryPolicy {
    /// Decide what happens to a job whose execution just failed.
    pub fn decide(attempts: i32, max_retries: i64, backoff_base: i64, fatal: bool) -> RetryDecision {
        if fatal {
            warn!(attempts, "non-retriable failure, moving job to DLQ");
            return RetryDecision::Dead;
        }
        if i64::from(attempts) > max_retries {
            warn!(attempts, max_retries, "retries exhausted, moving job to DLQ");
            return RetryDecision::Dead;
        }
        RetryDecision::RetryAfter(Self::backoff_delay(attempts, backoff_base))
    }

    /// Exponential backoff: `backoff_base ^ attempts` seconds, saturating at
    /// the one-day cap.
    pub fn backoff_delay(attempts: i32, backoff_base: i64) -> Duration {
        let base = backoff_base.max(1) as u64;
        let exp = attempts.max(0) as u32;
        let secs = base
            .checked_pow(exp)
            .unwrap_or(MAX_BACKOFF_SECS)
            .min(MAX_BACKOFF_SECS);
        Duration::from_secs(secs)
    }
}
