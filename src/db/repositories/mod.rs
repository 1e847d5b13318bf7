//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for a specific entity and hides the
//! SQLite/MySQL differences behind an `#[async_trait]` interface.

pub mod comment;
pub mod post;
pub mod session;
pub mod user;

pub use comment::{CommentRepository, SqlxCommentRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Check whether a repository error was caused by a UNIQUE constraint.
///
/// Services use this to turn insert races into domain errors instead of
/// internal failures.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .is_some_and(|db_err| db_err.is_unique_violation())
    })
}
