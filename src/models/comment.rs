//! Comment model

use serde::{Deserialize, Serialize};

use super::user::gravatar_url;

/// Comment entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub author_id: i64,
    pub text: String,
    pub post_id: i64,
}

impl Comment {
    /// Create a new, not yet persisted comment.
    pub fn new(post_id: i64, author_id: i64, text: impl Into<String>) -> Self {
        Self {
            id: 0, // Will be set by the database
            author_id,
            text: text.into(),
            post_id,
        }
    }
}

/// Comment joined with its author, for display under a post
#[derive(Debug, Clone, Serialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_name: String,
    pub avatar_url: String,
}

impl CommentWithAuthor {
    /// Attach author details; the email is only used to derive the avatar.
    pub fn new(comment: Comment, author_name: String, author_email: &str) -> Self {
        Self {
            comment,
            author_name,
            avatar_url: gravatar_url(author_email),
        }
    }
}
