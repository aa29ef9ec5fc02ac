//! SQLite-backed store for fields, tasks, the progress ledger and keywords.

mod fields;
mod keywords;
mod progress;
mod tasks;

pub use progress::{ProgressChange, ProgressCounts};
pub use tasks::{ConflictScope, CreateOutcome};

use fieldplan_core::{config::StoreConfig, error::PlanError, shellexpand};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database file and run migrations.
    pub async fn new(config: &StoreConfig) -> Result<Self, PlanError> {
        let db_path = shellexpand(&config.db_path);

        // Ensure parent directory exists.
        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PlanError::Store(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| PlanError::Store(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| PlanError::Store(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("store initialized at {db_path}");

        Ok(Self { pool })
    }

    /// Private in-memory database, used by tests and dry runs.
    ///
    /// Limited to one connection that never expires: every connection to
    /// `:memory:` would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self, PlanError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| PlanError::Store(format!("invalid db path: {e}")))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(|e| PlanError::Store(format!("failed to open in-memory sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection, checkpointing the WAL.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run SQL migrations.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), PlanError> {
        for migration in &[include_str!("../migrations/001_init.sql")] {
            sqlx::raw_sql(migration)
                .execute(pool)
                .await
                .map_err(|e| PlanError::Store(format!("migration failed: {e}")))?;
        }
        Ok(())
    }

    /// Get the database file size in bytes.
    pub async fn db_size(&self) -> Result<u64, PlanError> {
        let (page_count,): (i64,) = sqlx::query_as("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PlanError::Store(format!("pragma failed: {e}")))?;

        let (page_size,): (i64,) = sqlx::query_as("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PlanError::Store(format!("pragma failed: {e}")))?;

        Ok((page_count * page_size) as u64)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_migrates() {
        let store = Store::in_memory().await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(store.db_size().await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let store = Store::in_memory().await.unwrap();
        Store::run_migrations(store.pool()).await.unwrap();
    }
}
