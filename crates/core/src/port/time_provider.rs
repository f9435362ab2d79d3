// Time Provider Port (for testability)

use chrono::TimeZone;

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Render an epoch-ms timestamp as a local wall-clock string.
pub fn format_local_millis(millis: i64) -> String {
    match chrono::Local.timestamp_millis_opt(millis) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => millis.to_string(),
    }
}

/// Parse a local wall-clock string (`YYYY-MM-DD HH:MM:SS`) into epoch ms.
pub fn parse_local_datetime(s: &str) -> crate::error::Result<i64> {
    use crate::error::AppError;

    let naive = chrono::NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S").map_err(|e| {
        AppError::Validation(format!(
            "invalid timestamp '{}': {} (expected YYYY-MM-DD HH:MM:SS)",
            s, e
        ))
    })?;
    match naive.and_local_timezone(chrono::Local) {
        // A DST fold makes a wall-clock time ambiguous; take the earlier instant.
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            Ok(dt.timestamp_millis())
        }
        chrono::LocalResult::None => Err(AppError::Validation(format!(
            "timestamp '{}' does not exist in the local timezone",
            s
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_roundtrip() {
        let millis = parse_local_datetime("2026-03-01 12:30:45").unwrap();
        assert_eq!(format_local_millis(millis), "2026-03-01 12:30:45");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_local_datetime("tomorrow").is_err());
        assert!(parse_local_datetime("2026-03-01").is_err());
        assert!(parse_local_datetime("2026-13-01 00:00:00").is_err());
    }
}
