//! Comment repository
//!
//! Database operations for post comments.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentWithAuthor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Insert a new comment
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    /// Comments on a post joined with author name and avatar, oldest first
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_COMMENT: &str = "INSERT INTO comments (author_id, text, post_id) VALUES (?, ?, ?)";

const LIST_BY_POST_SQLITE: &str = r#"
    SELECT c.id, c.author_id, c.text, c.post_id, u.name AS author_name, u.email AS author_email
    FROM comments c
    INNER JOIN user u ON u.id = c.author_id
    WHERE c.post_id = ?
    ORDER BY c.id ASC
"#;

const LIST_BY_POST_MYSQL: &str = r#"
    SELECT c.id, c.author_id, c.text, c.post_id, u.name AS author_name, u.email AS author_email
    FROM comments c
    INNER JOIN `user` u ON u.id = c.author_id
    WHERE c.post_id = ?
    ORDER BY c.id ASC
"#;


#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_COMMENT)
                .bind(comment.author_id)
                .bind(&comment.text)
                .bind(comment.post_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_COMMENT)
                .bind(comment.author_id)
                .bind(&comment.text)
                .bind(comment.post_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create comment")?
                .last_insert_id() as i64,
        };

        Ok(Comment {
            id,
            ..comment.clone()
        })
    }

    async fn list_by_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(LIST_BY_POST_SQLITE)
                    .bind(post_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list comments")?;
                rows.iter()
                    .map(|row| -> Result<CommentWithAuthor> {
                        let comment = Comment {
                            id: row.try_get("id")?,
                            author_id: row.try_get("author_id")?,
                            text: row.try_get("text")?,
                            post_id: row.try_get("post_id")?,
                        };
                        let email: String = row.try_get("author_email")?;
                        Ok(CommentWithAuthor::new(comment, row.try_get("author_name")?, &email))
                    })
                    .collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(LIST_BY_POST_MYSQL)
                    .bind(post_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list comments")?;
                rows.iter()
                    .map(|row| -> Result<CommentWithAuthor> {
                        let comment = Comment {
                            id: row.try_get("id")?,
                            author_id: row.try_get("author_id")?,
                            text: row.try_get("text")?,
                            post_id: row.try_get("post_id")?,
                        };
                        let email: String = row.try_get("author_email")?;
                        Ok(CommentWithAuthor::new(comment, row.try_get("author_name")?, &email))
                    })
                    .collect()
            }
        }
    }
}
