//! SQLite pool for the lending store
//!
//! Booking commits from several `lendr` processes can hit one database file
//! at once. WAL lets browsing continue while a commit holds the write lock,
//! and a busy timeout makes a second writer wait for it instead of failing.
//! `listing_requests` rows must point at a live listing and user, so
//! foreign keys are switched on for every connection.

use std::{path::Path, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::StoreError;

/// Default pool size for file-backed databases
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// How long a connection waits on another process's write lock
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Schema-migrated SQLite pool shared by every store port
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database at `db_path`
    ///
    /// # Errors
    ///
    /// `ConnectionFailed` if the file or its directory cannot be opened,
    /// `MigrationFailed` if the schema cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        Self::with_max_connections(db_path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Like [`DatabasePool::new`], with an explicit pool size
    pub async fn with_max_connections(
        db_path: &Path,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::ConnectionFailed(format!(
                    "Failed to connect to database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::info!(
            path = %db_path.display(),
            max_connections,
            "Database pool initialized"
        );

        Ok(Self { pool })
    }

    /// Throwaway database for tests
    ///
    /// One connection only: each SQLite `:memory:` connection is its own
    /// database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                StoreError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        sqlx::raw_sql("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await
            .map_err(|e| {
                StoreError::MigrationFailed(format!("Failed to enable foreign keys: {}", e))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::debug!("In-memory database pool initialized");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the schema; every statement is `IF NOT EXISTS`
    async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
        let migration_sql = include_str!("migrations/20261001_initial.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| {
                StoreError::MigrationFailed(format!("Failed to run initial migration: {}", e))
            })?;

        tracing::debug!("Database migrations completed");
        Ok(())
    }
}
