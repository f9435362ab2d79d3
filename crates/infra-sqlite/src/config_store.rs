// SQLite ConfigStore Implementation

use async_trait::async_trait;
use queuectl_core::error::Result;
use queuectl_core::port::ConfigStore;
use sqlx::SqlitePool;

use crate::map_sqlx_error;

/// Key/value configuration table inside queue.db.
///
/// Stores only explicit overrides; defaults are merged in `snapshot`.
pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let value: Option<i64> = sqlx::query_scalar("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO config (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(String, i64)>> {
        let entries: Vec<(String, i64)> =
            sqlx::query_as("SELECT key, value FROM config ORDER BY key")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(entries)
    }
}
