//! Comment service
//!
//! Any logged-in user may comment on an existing post. Comments are never
//! edited; they disappear only when their post is deleted.

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, CommentWithAuthor};
use anyhow::Context;
use std::sync::Arc;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// The post being commented on does not exist
    #[error("Post not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    post_repo: Arc<dyn PostRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, post_repo: Arc<dyn PostRepository>) -> Self {
        Self { repo, post_repo }
    }

    /// Comments on a post in the order they were written
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>, CommentServiceError> {
        Ok(self
            .repo
            .list_by_post(post_id)
            .await
            .context("Failed to list comments")?)
    }

    /// Add a comment by `author_id` to `post_id`.
    ///
    /// # Errors
    ///
    /// - `Validation` if the text is blank
    /// - `NotFound` if the post does not exist
    pub async fn add(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment, CommentServiceError> {
        validate_comment_text(text)?;

        if self
            .post_repo
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .is_none()
        {
            return Err(CommentServiceError::NotFound(post_id));
        }

        let comment = self
            .repo
            .create(&Comment::new(post_id, author_id, text.trim()))
            .await
            .context("Failed to create comment")?;

        tracing::debug!(post_id, author_id, comment_id = comment.id, "Added comment");
        Ok(comment)
    }
}

/// Reject blank comments before touching the database.
pub fn validate_comment_text(text: &str) -> Result<(), CommentServiceError> {
    if text.trim().is_empty() {
        return Err(CommentServiceError::Validation("Comment cannot be empty".to_string()));
    }
    Ok(())
}
