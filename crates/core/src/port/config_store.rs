// Config Store Port (Interface)

use crate::domain::QueueConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Persistent key/value configuration map.
///
/// Workers read the effective config at the start of each job; the retry
/// decision reads it live inside the store's `fail` transaction.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Stored value for a key, if any override exists.
    async fn get(&self, key: &str) -> Result<Option<i64>>;

    /// Set (insert or overwrite) a key.
    async fn set(&self, key: &str, value: i64) -> Result<()>;

    /// All stored overrides, sorted by key.
    async fn entries(&self) -> Result<Vec<(String, i64)>>;

    /// Effective configuration: defaults merged under stored overrides.
    async fn snapshot(&self) -> Result<QueueConfig> {
        let entries = self.entries().await?;
        Ok(QueueConfig::from_entries(
            entries.iter().map(|(k, v)| (k.as_str(), *v)),
        ))
    }
}
