//! Lendr Store - SQLite persistence
//!
//! SQLite-backed storage for:
//! - Users, their reputation and the moderation reports on leader accounts
//! - Listings and their pending requests
//! - The append-only loan log
//!
//! ## Architecture
//!
//! This crate implements the `IIdentityStore`, `IListingStore` and
//! `IAuditLog` ports from `lendr-core` using SQLite as the storage backend.
//! It is a driven (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteLendingStore`] - Implementation of all three store ports
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use lendr_store::{DatabasePool, SqliteLendingStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/lendr/lendr.db")).await?;
//! let store = SqliteLendingStore::new(pool.pool().clone());
//! // Use store as IIdentityStore, IListingStore and IAuditLog...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteLendingStore;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be turned back into a domain value
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An update targeted a row that does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
