//! Database connection pool abstraction
//!
//! This module provides a unified interface for database operations that works
//! with both SQLite and MySQL backends. The appropriate pool is created based
//! on the configuration.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

/// Database pool trait that abstracts over different database backends.
///
/// Repositories dispatch on [`DatabasePool::driver`] and then borrow the
/// concrete pool through [`DatabasePool::sqlite`] or [`DatabasePool::mysql`].
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Execute a raw SQL query that doesn't return rows
    async fn execute(&self, query: &str) -> Result<u64>;

    /// Check if the database connection is healthy
    async fn ping(&self) -> Result<()>;

    /// Close the connection pool
    async fn close(&self);

    /// Get the database driver type
    fn driver(&self) -> DatabaseDriver;

    /// Get the underlying SQLite pool if this is a SQLite connection
    fn as_sqlite(&self) -> Option<&SqlitePool>;

    /// Get the underlying MySQL pool if this is a MySQL connection
    fn as_mysql(&self) -> Option<&MySqlPool>;

    /// Borrow the SQLite pool, failing if the driver is not SQLite
    fn sqlite(&self) -> Result<&SqlitePool> {
        self.as_sqlite()
            .ok_or_else(|| anyhow::anyhow!("Expected a SQLite pool, driver is {:?}", self.driver()))
    }

    /// Borrow the MySQL pool, failing if the driver is not MySQL
    fn mysql(&self) -> Result<&MySqlPool> {
        self.as_mysql()
            .ok_or_else(|| anyhow::anyhow!("Expected a MySQL pool, driver is {:?}", self.driver()))
    }
}

/// A connected pool for one of the supported drivers
pub enum Database {
    Sqlite(SqlitePool),
    Mysql(MySqlPool),
}

/// Where a configured SQLite URL points
#[derive(Debug, PartialEq, Eq)]
enum SqliteTarget {
    Memory,
    /// Connection URL and the database file it opens
    File { url: String, path: PathBuf },
}

/// Accepts `:memory:`, `sqlite::memory:`, `sqlite:` URLs and bare file paths.
fn sqlite_target(url: &str) -> SqliteTarget {
    if url == ":memory:" || url.starts_with("sqlite::memory:") {
        return SqliteTarget::Memory;
    }

    let url = if url.starts_with("sqlite:") {
        url.to_string()
    } else {
        format!("sqlite:{}", url)
    };
    let location = url.trim_start_matches("sqlite:").trim_start_matches("//");
    let path = PathBuf::from(location.split('?').next().unwrap_or(location));

    SqliteTarget::File { url, path }
}

impl Database {
    /// Open a SQLite database, creating the file and its directory if needed.
    ///
    /// Foreign keys are switched on for every connection.
    pub async fn connect_sqlite(url: &str) -> Result<Self> {
        let (connection_url, max_connections) = match sqlite_target(url) {
            // Every connection to `sqlite::memory:` sees its own database
            SqliteTarget::Memory => ("sqlite::memory:".to_string(), 1),
            SqliteTarget::File { url, path } => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory: {:?}", parent)
                    })?;
                }
                (url, 10)
            }
        };

        let options = SqliteConnectOptions::from_str(&connection_url)
            .with_context(|| format!("Invalid SQLite URL: {}", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database: {}", url))?;

        Ok(Database::Sqlite(pool))
    }

    /// Connect to a MySQL server. The `mysql://` scheme may be omitted.
    pub async fn connect_mysql(url: &str) -> Result<Self> {
        let connection_url = match url.strip_prefix("mysql://") {
            Some(_) => url.to_string(),
            None => format!("mysql://{}", url),
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(20)
            .connect(&connection_url)
            .await
            .with_context(|| format!("Failed to connect to MySQL database: {}", url))?;

        Ok(Database::Mysql(pool))
    }
}

#[async_trait]
impl DatabasePool for Database {
    async fn execute(&self, query: &str) -> Result<u64> {
        let rows = match self {
            Database::Sqlite(pool) => sqlx::query(query).execute(pool).await?.rows_affected(),
            Database::Mysql(pool) => sqlx::query(query).execute(pool).await?.rows_affected(),
        };
        Ok(rows)
    }

    async fn ping(&self) -> Result<()> {
        let probe = match self {
            Database::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(drop),
            Database::Mysql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(drop),
        };
        probe.context("Database ping failed")
    }

    async fn close(&self) {
        match self {
            Database::Sqlite(pool) => pool.close().await,
            Database::Mysql(pool) => pool.close().await,
        }
    }

    fn driver(&self) -> DatabaseDriver {
        match self {
            Database::Sqlite(_) => DatabaseDriver::Sqlite,
            Database::Mysql(_) => DatabaseDriver::Mysql,
        }
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        match self {
            Database::Sqlite(pool) => Some(pool),
            Database::Mysql(_) => None,
        }
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        match self {
            Database::Mysql(pool) => Some(pool),
            Database::Sqlite(_) => None,
        }
    }
}

/// Type alias for a shared database pool
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Create a database connection pool based on configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let database = match config.driver {
        DatabaseDriver::Sqlite => Database::connect_sqlite(&config.url).await?,
        DatabaseDriver::Mysql => Database::connect_mysql(&config.url).await?,
    };
    Ok(Arc::new(database))
}

/// Create a SQLite in-memory database pool for testing
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    let config = DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    };
    create_pool(&config).await
}
