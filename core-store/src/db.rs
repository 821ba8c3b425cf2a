//! # Database Connection Pool Module
//!
//! SQLite connection pooling and schema initialization.
//!
//! ## Features
//!
//! - **WAL Mode**: multiple readers alongside the single writer
//! - **Foreign Keys**: enforced for job/item integrity
//! - **Schema init**: idempotent `CREATE TABLE IF NOT EXISTS` on startup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_store::db::{create_pool, init_schema, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::new("/data/relay.db")).await?;
//! init_schema(&pool).await?;
//! ```
//!
//! For tests, use an in-memory database:
//!
//! ```rust,ignore
//! let pool = create_pool(DatabaseConfig::in_memory()).await?;
//! ```

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Database configuration for the SQLite connection pool
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (`sqlite:<path>` or `sqlite::memory:`)
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Create a configuration for the given database file path.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        Self {
            database_url: format!("sqlite:{}", path.display()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Create a configuration for an in-memory database (tests).
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Create a connection pool with WAL journaling and foreign keys enforced.
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| crate::StoreError::Database(e.to_string()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await?;

    info!(url = %config.database_url, "Database pool created");
    Ok(pool)
}

/// Create the four engine tables and their indexes if missing.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pending_transfers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            share_code TEXT NOT NULL,
            access_code TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_check INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transfer_jobs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL,
            total_count INTEGER NOT NULL DEFAULT 0,
            success_count INTEGER NOT NULL DEFAULT 0,
            fail_count INTEGER NOT NULL DEFAULT 0,
            min_delay_secs INTEGER NOT NULL DEFAULT 5,
            max_delay_secs INTEGER NOT NULL DEFAULT 15,
            skip_count INTEGER NOT NULL DEFAULT 0,
            position INTEGER NOT NULL DEFAULT 0,
            waiting INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transfer_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            share_code TEXT NOT NULL,
            access_code TEXT,
            title TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            links TEXT NOT NULL DEFAULT '[]',
            error_message TEXT,
            FOREIGN KEY (job_id) REFERENCES transfer_jobs(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_transfer_items_job_status
        ON transfer_items(job_id, status, position ASC)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS link_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            share_code TEXT NOT NULL UNIQUE,
            links TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Convenience for tests: in-memory pool with the schema applied.
pub async fn create_test_pool() -> Result<SqlitePool> {
    let pool = create_pool(DatabaseConfig::in_memory()).await?;
    init_schema(&pool).await?;
    Ok(pool)
}
