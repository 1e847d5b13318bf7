//! Data models
//!
//! Plain data structures shared by the repositories, services and templates:
//! - Database entities (User, Session, BlogPost, Comment)
//! - Joined read models used for rendering (posts with author names,
//!   comments with author names and avatars)
//! - Form inputs accepted by the services

mod comment;
mod post;
mod session;
mod user;

pub use comment::{Comment, CommentWithAuthor};
pub use post::{BlogPost, BlogPostWithAuthor, PostInput, POST_DATE_FORMAT};
pub use session::Session;
pub use user::{gravatar_url, User};
