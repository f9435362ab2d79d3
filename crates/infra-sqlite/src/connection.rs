// SQLite Connection Pool Setup

use queuectl_core::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::map_sqlx_error;

/// Create a SQLite connection pool with WAL mode and a busy timeout.
///
/// # Configuration
/// - `QUEUECTL_POOL_SIZE`: Max connections (default: 10)
/// - `QUEUECTL_POOL_TIMEOUT`: Busy timeout in seconds (default: 5)
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let mut max_connections: u32 = std::env::var("QUEUECTL_POOL_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    // An in-memory SQLite database exists per connection; more than one
    // connection would see independent empty databases.
    if database_url.contains(":memory:") {
        max_connections = 1;
    }

    let busy_timeout_secs: u64 = std::env::var("QUEUECTL_POOL_TIMEOUT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(map_sqlx_error)?
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(busy_timeout_secs))
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(map_sqlx_error)?;

    Ok(pool)
}
