// Schema migrations

use queuectl_core::error::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::map_sqlx_error;

const SCHEMA_VERSION: i64 = 1;
const INITIAL_SCHEMA: &str = include_str!("../migrations/001_initial_schema.sql");

/// Bring the database schema up to the current version.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    if applied_version(pool).await? >= SCHEMA_VERSION {
        return Ok(());
    }

    info!(version = SCHEMA_VERSION, "applying schema migration");

    // All statements of a migration land or none do
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
    for statement in statements(INITIAL_SCHEMA) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
    }
    tx.commit().await.map_err(map_sqlx_error)?;

    Ok(())
}

/// Highest version recorded in schema_version; 0 on a fresh database.
async fn applied_version(pool: &SqlitePool) -> Result<i64> {
    let has_version_table: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
    )
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;

    if has_version_table == 0 {
        return Ok(0);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(map_sqlx_error)?;

    Ok(version.unwrap_or(0))
}

/// Executable statements of a migration file. Fragments that hold nothing
/// but whitespace and `--` comments are skipped; a comment directly above a
/// statement stays attached to it, which SQLite accepts. Migration files do
/// not put semicolons inside string literals.
fn statements(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(';').map(str::trim).filter(|fragment| {
        fragment
            .lines()
            .any(|line| !line.trim().is_empty() && !line.trim().starts_with("--"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;

    #[test]
    fn test_statements_skip_comment_only_fragments() {
        let sql = "-- header\nCREATE TABLE a (x);\n\n-- note\n-- more\n;\nCREATE TABLE b (y);\n";
        let found: Vec<&str> = statements(sql).collect();
        assert_eq!(found.len(), 2);
        assert!(found[0].contains("CREATE TABLE a"));
        assert!(found[1].contains("CREATE TABLE b"));
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        for table in ["jobs", "config", "workers"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 0, "table {} should exist and be empty", table);
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
