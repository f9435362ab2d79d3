// Queue Configuration

/// Maximum number of retries after the first attempt before a job moves to
/// the DLQ. A value of 3 permits up to 4 total executions.
pub const KEY_MAX_RETRIES: &str = "max-retries";
/// Integer base b for exponential backoff; delay after n attempts = b^n seconds.
pub const KEY_BACKOFF_BASE: &str = "backoff-base";
/// Per-job wall-clock execution timeout in seconds.
pub const KEY_JOB_TIMEOUT: &str = "job-timeout";

pub const KNOWN_KEYS: [&str; 3] = [KEY_MAX_RETRIES, KEY_BACKOFF_BASE, KEY_JOB_TIMEOUT];

/// Effective queue configuration: defaults merged under stored overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub max_retries: i64,
    pub backoff_base: i64,
    pub job_timeout_secs: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: 2,
            job_timeout_secs: 300,
        }
    }
}

impl QueueConfig {
    /// Build a config from stored `(key, value)` entries, falling back to
    /// defaults for absent keys. Unknown keys are ignored.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        let mut config = Self::default();
        for (key, value) in entries {
            match key {
                KEY_MAX_RETRIES => config.max_retries = value,
                KEY_BACKOFF_BASE => config.backoff_base = value,
                KEY_JOB_TIMEOUT => config.job_timeout_secs = value,
                _ => {}
            }
        }
        config
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        match key {
            KEY_MAX_RETRIES => Some(self.max_retries),
            KEY_BACKOFF_BASE => Some(self.backoff_base),
            KEY_JOB_TIMEOUT => Some(self.job_timeout_secs),
            _ => None,
        }
    }
}

/// Validate a `config set` key/value pair.
pub fn validate_config_value(key: &str, value: i64) -> crate::error::Result<()> {
    use crate::error::AppError;

    match key {
        KEY_MAX_RETRIES => {
            if value < 0 {
                return Err(AppError::Config(format!(
                    "{} must be >= 0 (got {})",
                    KEY_MAX_RETRIES, value
                )));
            }
        }
        KEY_BACKOFF_BASE | KEY_JOB_TIMEOUT => {
            if value < 1 {
                return Err(AppError::Config(format!("{} must be >= 1 (got {})", key, value)));
            }
        }
        _ => {
            return Err(AppError::Config(format!(
                "unknown config key '{}' (valid keys: {})",
                key,
                KNOWN_KEYS.join(", ")
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff_base, 2);
        assert_eq!(config.job_timeout_secs, 300);
    }

    #[test]
    fn test_from_entries_overrides() {
        let config = QueueConfig::from_entries([("max-retries", 5), ("backoff-base", 3)]);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff_base, 3);
        assert_eq!(config.job_timeout_secs, 300);
    }

    #[test]
    fn test_from_entries_ignores_unknown() {
        let config = QueueConfig::from_entries([("bogus", 42)]);
        assert_eq!(config, QueueConfig::default());
    }

    #[test]
    fn test_validate_config_value() {
        assert!(validate_config_value("max-retries", 0).is_ok());
        assert!(validate_config_value("max-retries", -1).is_err());
        assert!(validate_config_value("backoff-base", 1).is_ok());
        assert!(validate_config_value("backoff-base", 0).is_err());
        assert!(validate_config_value("job-timeout", 30).is_ok());
        assert!(validate_config_value("nope", 1).is_err());
    }
}
