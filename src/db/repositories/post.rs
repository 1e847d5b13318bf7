//! Blog post repository
//!
//! Database operations for blog posts. Listing and single-post reads join the
//! author row explicitly so no lazy lookups are needed when rendering.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{BlogPost, BlogPostWithAuthor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Blog post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a new post. Fails on a duplicate title.
    async fn create(&self, post: &BlogPost) -> Result<BlogPost>;

    /// Get a post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<BlogPost>>;

    /// Get a post joined with its author's name
    async fn get_with_author(&self, id: i64) -> Result<Option<BlogPostWithAuthor>>;

    /// Check whether a title is used by a post other than `exclude_id`
    ///
    /// Case-sensitive on both drivers; the MySQL column is `utf8mb4_bin`.
    async fn title_exists(&self, title: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Overwrite title, subtitle, body and img_url of an existing post
    async fn update(&self, post: &BlogPost) -> Result<BlogPost>;

    /// Delete a post and its comments in one transaction.
    ///
    /// Returns `false` if no post with that ID existed.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// List all posts with author names, newest first
    async fn list_with_authors(&self) -> Result<Vec<BlogPostWithAuthor>>;
}

/// SQLx-based blog post repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_POST: &str = "SELECT id, title, subtitle, date, body, img_url, author_id FROM blog_posts";

const SELECT_POST_WITH_AUTHOR: &str = r#"
    SELECT p.id, p.title, p.subtitle, p.date, p.body, p.img_url, p.author_id, u.name AS author_name
    FROM blog_posts p
    INNER JOIN user u ON u.id = p.author_id
"#;

const SELECT_POST_WITH_AUTHOR_MYSQL: &str = r#"
    SELECT p.id, p.title, p.subtitle, p.date, p.body, p.img_url, p.author_id, u.name AS author_name
    FROM blog_posts p
    INNER JOIN `user` u ON u.id = p.author_id
"#;

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &BlogPost) -> Result<BlogPost> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<BlogPost>> {
        let query = format!("{} WHERE id = ?", SELECT_POST);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&query)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get post by ID")?;
                row.as_ref().map(row_to_post_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&query)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get post by ID")?;
                row.as_ref().map(row_to_post_mysql).transpose()
            }
        }
    }

    async fn get_with_author(&self, id: i64) -> Result<Option<BlogPostWithAuthor>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let query = format!("{} WHERE p.id = ?", SELECT_POST_WITH_AUTHOR);
                let row = sqlx::query(&query)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get post with author")?;
                row.as_ref().map(row_to_post_with_author_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let query = format!("{} WHERE p.id = ?", SELECT_POST_WITH_AUTHOR_MYSQL);
                let row = sqlx::query(&query)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get post with author")?;
                row.as_ref().map(row_to_post_with_author_mysql).transpose()
            }
        }
    }

    async fn title_exists(&self, title: &str, exclude_id: Option<i64>) -> Result<bool> {
        let query = "SELECT COUNT(*) as count FROM blog_posts WHERE title = ? AND id != ?";
        // Real post IDs start at 1, so 0 excludes nothing.
        let exclude_id = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(title)
                .bind(exclude_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check post title")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(title)
                .bind(exclude_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check post title")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn update(&self, post: &BlogPost) -> Result<BlogPost> {
        let query = "UPDATE blog_posts SET title = ?, subtitle = ?, body = ?, img_url = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(query)
                    .bind(&post.title)
                    .bind(&post.subtitle)
                    .bind(&post.body)
                    .bind(&post.img_url)
                    .bind(post.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update post")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(query)
                    .bind(&post.title)
                    .bind(&post.subtitle)
                    .bind(&post.body)
                    .bind(&post.img_url)
                    .bind(post.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update post")?;
            }
        }
        Ok(post.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_post_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_post_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_with_authors(&self) -> Result<Vec<BlogPostWithAuthor>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let query = format!("{} ORDER BY p.id DESC", SELECT_POST_WITH_AUTHOR);
                let rows = sqlx::query(&query)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list posts")?;
                rows.iter().map(row_to_post_with_author_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let query = format!("{} ORDER BY p.id DESC", SELECT_POST_WITH_AUTHOR_MYSQL);
                let rows = sqlx::query(&query)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list posts")?;
                rows.iter().map(row_to_post_with_author_mysql).collect()
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &BlogPost) -> Result<BlogPost> {
    let result = sqlx::query(
        r#"
        INSERT INTO blog_posts (title, subtitle, date, body, img_url, author_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.subtitle)
    .bind(&post.date)
    .bind(&post.body)
    .bind(&post.img_url)
    .bind(post.author_id)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(BlogPost {
        id: result.last_insert_rowid(),
        ..post.clone()
    })
}

async fn delete_post_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM comments WHERE post_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete post comments")?;

    let deleted = sqlx::query("DELETE FROM blog_posts WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete post")?
        .rows_affected();

    tx.commit().await.context("Failed to commit post deletion")?;
    Ok(deleted > 0)
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<BlogPost> {
    Ok(BlogPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        subtitle: row.try_get("subtitle")?,
        date: row.try_get("date")?,
        body: row.try_get("body")?,
        img_url: row.try_get("img_url")?,
        author_id: row.try_get("author_id")?,
    })
}

fn row_to_post_with_author_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<BlogPostWithAuthor> {
    Ok(BlogPostWithAuthor {
        post: row_to_post_sqlite(row)?,
        author_name: row.try_get("author_name")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &BlogPost) -> Result<BlogPost> {
    let result = sqlx::query(
        r#"
        INSERT INTO blog_posts (title, subtitle, date, body, img_url, author_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.subtitle)
    .bind(&post.date)
    .bind(&post.body)
    .bind(&post.img_url)
    .bind(post.author_id)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(BlogPost {
        id: result.last_insert_id() as i64,
        ..post.clone()
    })
}

async fn delete_post_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM comments WHERE post_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete post comments")?;

    let deleted = sqlx::query("DELETE FROM blog_posts WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete post")?
        .rows_affected();

    tx.commit().await.context("Failed to commit post deletion")?;
    Ok(deleted > 0)
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<BlogPost> {
    Ok(BlogPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        subtitle: row.try_get("subtitle")?,
        date: row.try_get("date")?,
        body: row.try_get("body")?,
        img_url: row.try_get("img_url")?,
        author_id: row.try_get("author_id")?,
    })
}

fn row_to_post_with_author_mysql(row: &sqlx::mysql::MySqlRow) -> Result<BlogPostWithAuthor> {
    Ok(BlogPostWithAuthor {
        post: row_to_post_mysql(row)?,
        author_name: row.try_get("author_name")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::is_unique_violation;
    use crate::db::{create_test_pool, migrations};
    use crate::models::PostInput;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxPostRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let author_id = sqlx::query("INSERT INTO user (name, email, password) VALUES (?, ?, ?)")
            .bind("Admin")
            .bind("admin@example.com")
            .bind("hash")
            .execute(pool.sqlite().unwrap())
            .await
            .expect("Failed to create author")
            .last_insert_rowid();
        let repo = SqlxPostRepository::new(pool.clone());
        (pool, repo, author_id)
    }

    fn test_post(title: &str, author_id: i64) -> BlogPost {
        BlogPost::new(
            PostInput::new(title, "A subtitle", "https://example.com/a.png", "<p>Body</p>"),
            author_id,
        )
    }

    async fn comment_count(pool: &DynDatabasePool, post_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let (_pool, repo, author_id) = setup_test_repo().await;

        let created = repo
            .create(&test_post("First", author_id))
            .await
            .expect("Failed to create post");
        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get post")
            .expect("Post not found");

        assert!(created.id > 0);
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_get_with_author() {
        let (_pool, repo, author_id) = setup_test_repo().await;
        let created = repo.create(&test_post("First", author_id)).await.unwrap();

        let found = repo
            .get_with_author(created.id)
            .await
            .expect("Failed to get post")
            .expect("Post not found");

        assert_eq!(found.author_name, "Admin");
        assert_eq!(found.post.title, "First");
        assert!(repo.get_with_author(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_title_is_unique_violation() {
        let (_pool, repo, author_id) = setup_test_repo().await;
        repo.create(&test_post("Same", author_id)).await.unwrap();

        let err = repo
            .create(&test_post("Same", author_id))
            .await
            .expect_err("Duplicate title should fail");

        assert!(is_unique_violation(&err));
        assert_eq!(repo.list_with_authors().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_title_exists_excludes_self() {
        let (_pool, repo, author_id) = setup_test_repo().await;
        let post = repo.create(&test_post("Taken", author_id)).await.unwrap();

        assert!(repo.title_exists("Taken", None).await.unwrap());
        assert!(!repo.title_exists("Taken", Some(post.id)).await.unwrap());
        assert!(!repo.title_exists("Free", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_titles_compare_case_sensitively() {
        let (_pool, repo, author_id) = setup_test_repo().await;
        repo.create(&test_post("Hello World", author_id)).await.unwrap();

        assert!(!repo.title_exists("hello world", None).await.unwrap());
        repo.create(&test_post("hello world", author_id))
            .await
            .expect("Titles differing only in case are distinct");
        assert_eq!(repo.list_with_authors().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_date_and_author() {
        let (_pool, repo, author_id) = setup_test_repo().await;
        let mut post = repo.create(&test_post("Old", author_id)).await.unwrap();
        let original_date = post.date.clone();

        post.apply(PostInput::new("New", "New sub", "/img/new.png", "<p>New</p>"));
        repo.update(&post).await.expect("Failed to update post");

        let found = repo.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(found.title, "New");
        assert_eq!(found.img_url, "/img/new.png");
        assert_eq!(found.date, original_date);
        assert_eq!(found.author_id, author_id);
    }

    #[tokio::test]
    async fn test_delete_removes_post_and_comments() {
        let (pool, repo, author_id) = setup_test_repo().await;
        let post = repo.create(&test_post("Doomed", author_id)).await.unwrap();
        sqlx::query("INSERT INTO comments (author_id, text, post_id) VALUES (?, ?, ?)")
            .bind(author_id)
            .bind("bye")
            .bind(post.id)
            .execute(pool.sqlite().unwrap())
            .await
            .unwrap();

        let deleted = repo.delete(post.id).await.expect("Failed to delete post");

        assert!(deleted);
        assert!(repo.get_by_id(post.id).await.unwrap().is_none());
        assert_eq!(comment_count(&pool, post.id).await, 0);
    }

    #[tokio::test]
    async fn test_delete_missing_post() {
        let (_pool, repo, _author_id) = setup_test_repo().await;

        let deleted = repo.delete(42).await.expect("Delete should not error");

        assert!(!deleted);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_pool, repo, author_id) = setup_test_repo().await;
        for title in ["One", "Two", "Three"] {
            repo.create(&test_post(title, author_id)).await.unwrap();
        }

        let posts = repo.list_with_authors().await.expect("Failed to list posts");
        let titles: Vec<&str> = posts.iter().map(|p| p.post.title.as_str()).collect();

        assert_eq!(titles, vec!["Three", "Two", "One"]);
        assert!(posts.iter().all(|p| p.author_name == "Admin"));
    }
}
