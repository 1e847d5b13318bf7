//! Database migrations module
//!
//! All migrations are embedded directly in Rust code as SQL strings, with one
//! variant for SQLite and one for MySQL, so a single binary can bring any
//! empty database up to the current schema.
//!
//! # Usage
//!
//! ```ignore
//! use quillpost::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use sqlx::{MySqlPool, SqlitePool};
use std::collections::BTreeSet;

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// All schema migrations, applied in version order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_user",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(250) NOT NULL,
                email VARCHAR(250) NOT NULL UNIQUE,
                password VARCHAR(250) NOT NULL
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS `user` (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(250) NOT NULL,
                email VARCHAR(250) NOT NULL UNIQUE,
                password VARCHAR(250) NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES user(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES `user`(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_blog_posts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS blog_posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(250) NOT NULL UNIQUE,
                subtitle VARCHAR(250) NOT NULL,
                date VARCHAR(250) NOT NULL,
                body TEXT NOT NULL,
                img_url VARCHAR(250) NOT NULL,
                author_id INTEGER NOT NULL,
                FOREIGN KEY (author_id) REFERENCES user(id)
            );
            CREATE INDEX IF NOT EXISTS idx_blog_posts_author_id ON blog_posts(author_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS blog_posts (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(250) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL UNIQUE,
                subtitle VARCHAR(250) NOT NULL,
                date VARCHAR(250) NOT NULL,
                body LONGTEXT NOT NULL,
                img_url VARCHAR(250) NOT NULL,
                author_id BIGINT NOT NULL,
                FOREIGN KEY (author_id) REFERENCES `user`(id)
            );
            CREATE INDEX idx_blog_posts_author_id ON blog_posts(author_id);
        "#,
    },
    Migration {
        version: 4,
        name: "create_comments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                post_id INTEGER NOT NULL,
                FOREIGN KEY (author_id) REFERENCES user(id),
                FOREIGN KEY (post_id) REFERENCES blog_posts(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                author_id BIGINT NOT NULL,
                text TEXT NOT NULL,
                post_id BIGINT NOT NULL,
                FOREIGN KEY (author_id) REFERENCES `user`(id),
                FOREIGN KEY (post_id) REFERENCES blog_posts(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_comments_post_id ON comments(post_id);
        "#,
    },
];

/// Run all pending migrations.
///
/// Returns the number of migrations applied by this call.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    let pending = pending_migrations(pool).await?;

    for migration in &pending {
        tracing::info!("Applying migration {}: {}", migration.version, migration.name);
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
    }

    match pending.len() {
        0 => tracing::debug!("Schema is up to date"),
        n => tracing::info!("Applied {} migration(s)", n),
    }
    Ok(pending.len())
}

/// Migrations not yet recorded in `_migrations`, in version order
async fn pending_migrations(pool: &DynDatabasePool) -> Result<Vec<&'static Migration>> {
    let int_type = match pool.driver() {
        DatabaseDriver::Sqlite => "INTEGER",
        DatabaseDriver::Mysql => "INT",
    };
    pool.execute(&MIGRATIONS_TABLE.replace("{int}", int_type))
        .await
        .context("Failed to create _migrations table")?;

    let applied = match pool.driver() {
        DatabaseDriver::Sqlite => applied_versions_sqlite(pool.sqlite()?).await?,
        DatabaseDriver::Mysql => applied_versions_mysql(pool.mysql()?).await?,
    };

    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&i64::from(m.version)))
        .collect())
}

const MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version {int} PRIMARY KEY,
        name VARCHAR(255) NOT NULL UNIQUE,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

const APPLIED_VERSIONS: &str = "SELECT version FROM _migrations";
const RECORD_MIGRATION: &str = "INSERT INTO _migrations (version, name) VALUES (?, ?)";

async fn applied_versions_sqlite(pool: &SqlitePool) -> Result<BTreeSet<i64>> {
    let versions: Vec<i64> = sqlx::query_scalar(APPLIED_VERSIONS)
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;
    Ok(versions.into_iter().collect())
}

async fn applied_versions_mysql(pool: &MySqlPool) -> Result<BTreeSet<i64>> {
    let versions: Vec<i32> = sqlx::query_scalar(APPLIED_VERSIONS)
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;
    Ok(versions.into_iter().map(i64::from).collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => {
            // Schema change and bookkeeping row commit together
            let mut tx = pool.sqlite()?.begin().await?;
            for statement in split_sql_statements(migration.up_sqlite) {
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
            }
            sqlx::query(RECORD_MIGRATION)
                .bind(migration.version)
                .bind(migration.name)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        DatabaseDriver::Mysql => {
            // MySQL DDL commits implicitly; statements run directly on the pool
            let mysql = pool.mysql()?;
            for statement in split_sql_statements(migration.up_mysql) {
                sqlx::query(statement)
                    .execute(mysql)
                    .await
                    .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
            }
            sqlx::query(RECORD_MIGRATION)
                .bind(migration.version)
                .bind(migration.name)
                .execute(mysql)
                .await?;
        }
    }
    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, dropping empty and comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed.starts_with("--")
    })
}
