//! Services layer - Business logic
//!
//! Services sit between the web handlers and the repositories. They:
//! - Enforce business rules (unique emails and titles, required fields)
//! - Translate storage failures into typed, per-service error enums
//! - Log security-relevant events

pub mod comment;
pub mod password;
pub mod post;
pub mod user;

pub use comment::{CommentService, CommentServiceError};
pub use password::{hash_password, verify_password};
pub use post::{PostService, PostServiceError};
pub use user::{LoggedIn, LoginInput, RegisterInput, UserService, UserServiceError};
