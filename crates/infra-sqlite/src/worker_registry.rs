// SQLite WorkerRegistry Implementation

use async_trait::async_trait;
use queuectl_core::error::Result;
use queuectl_core::port::{WorkerEntry, WorkerRegistry};
use sqlx::SqlitePool;

use crate::map_sqlx_error;

/// Worker registry table inside queue.db: one row per (supposedly) live
/// worker process.
pub struct SqliteWorkerRegistry {
    pool: SqlitePool,
}

impl SqliteWorkerRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkerRegistry for SqliteWorkerRegistry {
    async fn register(&self, entry: &WorkerEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO workers (worker_id, pid, started_at) VALUES (?, ?, ?) \
             ON CONFLICT(worker_id) DO UPDATE SET pid = excluded.pid, started_at = excluded.started_at",
        )
        .bind(&entry.worker_id)
        .bind(entry.pid)
        .bind(entry.started_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn remove(&self, worker_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM workers WHERE worker_id = ?")
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM workers")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<WorkerEntry>> {
        let rows: Vec<(String, i32, i64)> =
            sqlx::query_as("SELECT worker_id, pid, started_at FROM workers ORDER BY started_at ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(worker_id, pid, started_at)| WorkerEntry {
                worker_id,
                pid,
                started_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn setup_registry() -> SqliteWorkerRegistry {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteWorkerRegistry::new(pool)
    }

    fn entry(worker_id: &str, pid: i32, started_at: i64) -> WorkerEntry {
        WorkerEntry {
            worker_id: worker_id.to_string(),
            pid,
            started_at,
        }
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let registry = setup_registry().await;
        registry.register(&entry("w-1", 100, 2000)).await.unwrap();
        registry.register(&entry("w-2", 101, 1000)).await.unwrap();

        let entries = registry.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].worker_id, "w-2");
        assert_eq!(entries[1].pid, 100);
    }

    #[tokio::test]
    async fn test_register_replaces_same_worker_id() {
        let registry = setup_registry().await;
        registry.register(&entry("w-1", 100, 1000)).await.unwrap();
        registry.register(&entry("w-1", 200, 2000)).await.unwrap();

        let entries = registry.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].pid, 200);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let registry = setup_registry().await;
        registry.register(&entry("w-1", 100, 1000)).await.unwrap();
        registry.register(&entry("w-2", 101, 1001)).await.unwrap();

        registry.remove("w-1").await.unwrap();
        assert_eq!(registry.entries().await.unwrap().len(), 1);

        registry.clear().await.unwrap();
        assert!(registry.entries().await.unwrap().is_empty());
    }
}
