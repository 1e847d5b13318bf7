//! Post service
//!
//! Business rules for blog posts: listing, lookup, and the admin-only
//! create/edit/delete operations. Callers are responsible for checking that
//! the acting user is the administrator before invoking a mutation.

use crate::db::repositories::{is_unique_violation, PostRepository};
use crate::models::{BlogPost, BlogPostWithAuthor, PostInput};
use anyhow::Context;
use std::sync::Arc;

/// Maximum stored lengths, matching the `blog_posts` columns.
const MAX_FIELD_LEN: usize = 250;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post not found
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// Form input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Another post already uses the title
    #[error("A post with this title already exists: {0}")]
    DuplicateTitle(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Post service for managing blog posts
pub struct PostService {
    repo: Arc<dyn PostRepository>,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepository>) -> Self {
        Self { repo }
    }

    /// All posts with author names, newest first
    pub async fn list(&self) -> Result<Vec<BlogPostWithAuthor>, PostServiceError> {
        Ok(self.repo.list_with_authors().await.context("Failed to list posts")?)
    }

    /// Get a post by ID
    pub async fn get(&self, id: i64) -> Result<BlogPost, PostServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound(id))
    }

    /// Get a post with its author's name
    pub async fn get_with_author(&self, id: i64) -> Result<BlogPostWithAuthor, PostServiceError> {
        self.repo
            .get_with_author(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound(id))
    }

    /// Create a post authored by `author_id`, dated today.
    ///
    /// # Errors
    ///
    /// - `Validation` if a field is empty, too long, or the image URL is not
    ///   an http(s) or site-relative URL
    /// - `DuplicateTitle` if the title is taken; nothing is written
    pub async fn create(&self, input: PostInput, author_id: i64) -> Result<BlogPost, PostServiceError> {
        let input = input.normalized();
        validate_post_input(&input)?;
        self.ensure_title_free(&input.title, None).await?;

        let post = BlogPost::new(input, author_id);
        let created = self.repo.create(&post).await.map_err(|e| {
            if is_unique_violation(&e) {
                PostServiceError::DuplicateTitle(post.title.clone())
            } else {
                PostServiceError::InternalError(e.context("Failed to create post"))
            }
        })?;

        tracing::info!(post_id = created.id, author_id, "Created post");
        Ok(created)
    }

    /// Overwrite the editable fields of a post. ID, date and author are kept.
    pub async fn update(&self, id: i64, input: PostInput) -> Result<BlogPost, PostServiceError> {
        let mut post = self.get(id).await?;

        let input = input.normalized();
        validate_post_input(&input)?;
        self.ensure_title_free(&input.title, Some(id)).await?;

        post.apply(input);
        let updated = self.repo.update(&post).await.map_err(|e| {
            if is_unique_violation(&e) {
                PostServiceError::DuplicateTitle(post.title.clone())
            } else {
                PostServiceError::InternalError(e.context("Failed to update post"))
            }
        })?;

        tracing::info!(post_id = id, "Updated post");
        Ok(updated)
    }

    /// Delete a post together with its comments.
    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete post")?;
        if !deleted {
            return Err(PostServiceError::NotFound(id));
        }

        tracing::info!(post_id = id, "Deleted post");
        Ok(())
    }

    async fn ensure_title_free(&self, title: &str, exclude_id: Option<i64>) -> Result<(), PostServiceError> {
        if self
            .repo
            .title_exists(title, exclude_id)
            .await
            .context("Failed to check post title")?
        {
            return Err(PostServiceError::DuplicateTitle(title.to_string()));
        }
        Ok(())
    }
}

fn validate_post_input(input: &PostInput) -> Result<(), PostServiceError> {
    let required = [
        ("Title", &input.title),
        ("Subtitle", &input.subtitle),
        ("Image URL", &input.img_url),
    ];
    for (label, value) in required {
        if value.is_empty() {
            return Err(PostServiceError::Validation(format!("{} cannot be empty", label)));
        }
        if value.chars().count() > MAX_FIELD_LEN {
            return Err(PostServiceError::Validation(format!(
                "{} must be at most {} characters",
                label, MAX_FIELD_LEN
            )));
        }
    }

    if input.body.trim().is_empty() {
        return Err(PostServiceError::Validation("Body cannot be empty".to_string()));
    }

    if !is_valid_image_url(&input.img_url) {
        return Err(PostServiceError::Validation(
            "Image URL must start with http://, https:// or /".to_string(),
        ));
    }

    Ok(())
}

fn is_valid_image_url(url: &str) -> bool {
    let has_scheme = ["http://", "https://"]
        .iter()
        .any(|scheme| url.starts_with(scheme) && url.len() > scheme.len());
    // Protocol-relative URLs ("//host/...") are rejected.
    let site_relative = url.starts_with('/') && !url.starts_with("//");
    has_scheme || site_relative
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxPostRepository;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use chrono::Local;
    use proptest::prelude::*;

    async fn setup_test_service() -> (DynDatabasePool, PostService, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let admin_id = sqlx::query("INSERT INTO user (name, email, password) VALUES (?, ?, ?)")
            .bind("Admin")
            .bind("admin@example.com")
            .bind("hash")
            .execute(pool.sqlite().unwrap())
            .await
            .expect("Failed to create admin")
            .last_insert_rowid();
        let service = PostService::new(SqlxPostRepository::boxed(pool.clone()));
        (pool, service, admin_id)
    }

    fn input(title: &str) -> PostInput {
        PostInput::new(title, "Subtitle", "https://example.com/cover.jpg", "<p>Body</p>")
    }

    #[tokio::test]
    async fn test_create_post_stamps_date_and_author() {
        let (_pool, service, admin_id) = setup_test_service().await;

        let post = service.create(input("T1"), admin_id).await.expect("Failed to create");

        assert_eq!(post.title, "T1");
        assert_eq!(post.author_id, admin_id);
        assert_eq!(post.date, BlogPost::format_date(Local::now().date_naive()));
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_title() {
        let (_pool, service, admin_id) = setup_test_service().await;
        service.create(input("T1"), admin_id).await.unwrap();

        let result = service.create(input("  T1 "), admin_id).await;

        assert!(matches!(result, Err(PostServiceError::DuplicateTitle(_))));
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (_pool, service, admin_id) = setup_test_service().await;

        let cases = [
            PostInput::new("", "Sub", "/a.png", "body"),
            PostInput::new("T", "", "/a.png", "body"),
            PostInput::new("T", "Sub", "", "body"),
            PostInput::new("T", "Sub", "/a.png", "   "),
            PostInput::new("T", "Sub", "javascript:alert(1)", "body"),
            PostInput::new("x".repeat(251), "Sub", "/a.png", "body"),
        ];
        for case in cases {
            let result = service.create(case, admin_id).await;
            assert!(matches!(result, Err(PostServiceError::Validation(_))));
        }
        assert_eq!(service.list().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_get_missing_post() {
        let (_pool, service, _admin_id) = setup_test_service().await;

        assert!(matches!(service.get(7).await, Err(PostServiceError::NotFound(7))));
        assert!(matches!(
            service.get_with_author(7).await,
            Err(PostServiceError::NotFound(7))
        ));
    }

    #[tokio::test]
    async fn test_update_post() {
        let (_pool, service, admin_id) = setup_test_service().await;
        let original = service.create(input("Before"), admin_id).await.unwrap();

        let updated = service
            .update(original.id, PostInput::new("After", "New sub", "/img/b.png", "<p>New</p>"))
            .await
            .expect("Failed to update");

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.date, original.date);
        assert_eq!(updated.author_id, admin_id);
        let reloaded = service.get(original.id).await.unwrap();
        assert_eq!(reloaded.title, "After");
        assert_eq!(reloaded.body, "<p>New</p>");
    }

    #[tokio::test]
    async fn test_update_keeping_own_title() {
        let (_pool, service, admin_id) = setup_test_service().await;
        let post = service.create(input("Same"), admin_id).await.unwrap();

        let result = service.update(post.id, input("Same")).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_update_to_taken_title() {
        let (_pool, service, admin_id) = setup_test_service().await;
        service.create(input("Taken"), admin_id).await.unwrap();
        let other = service.create(input("Other"), admin_id).await.unwrap();

        let result = service.update(other.id, input("Taken")).await;

        assert!(matches!(result, Err(PostServiceError::DuplicateTitle(_))));
        assert_eq!(service.get(other.id).await.unwrap().title, "Other");
    }

    #[tokio::test]
    async fn test_update_missing_post() {
        let (_pool, service, _admin_id) = setup_test_service().await;

        let result = service.update(99, input("Anything")).await;

        assert!(matches!(result, Err(PostServiceError::NotFound(99))));
    }

    #[tokio::test]
    async fn test_delete_post() {
        let (_pool, service, admin_id) = setup_test_service().await;
        let keep = service.create(input("Keep"), admin_id).await.unwrap();
        let gone = service.create(input("Gone"), admin_id).await.unwrap();

        service.delete(gone.id).await.expect("Failed to delete");

        let listed: Vec<i64> = service.list().await.unwrap().iter().map(|p| p.post.id).collect();
        assert_eq!(listed, vec![keep.id]);
        assert!(matches!(
            service.delete(gone.id).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_is_valid_image_url() {
        assert!(is_valid_image_url("https://images.example.com/a.jpg"));
        assert!(is_valid_image_url("http://example.com/a.jpg"));
        assert!(is_valid_image_url("/static/img/a.jpg"));
        assert!(!is_valid_image_url("https://"));
        assert!(!is_valid_image_url("//evil.example.com/a.jpg"));
        assert!(!is_valid_image_url("data:image/png;base64,AAAA"));
        assert!(!is_valid_image_url("a.jpg"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Any creatable title is stored exactly once, and a second create fails.
        #[test]
        fn prop_titles_are_unique(title in "[A-Za-z0-9][A-Za-z0-9 ]{0,40}[A-Za-z0-9]") {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let (_pool, service, admin_id) = setup_test_service().await;

                let first = service.create(input(&title), admin_id).await;
                let second = service.create(input(&title), admin_id).await;

                prop_assert!(first.is_ok());
                prop_assert!(matches!(second, Err(PostServiceError::DuplicateTitle(_))));
                prop_assert_eq!(service.list().await.unwrap().len(), 1);
                Ok(())
            });
            result?;
        }
    }
}
