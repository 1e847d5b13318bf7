//! User model

use serde::{Deserialize, Serialize};

/// Base URL for avatar images derived from an email hash.
const GRAVATAR_BASE: &str = "https://www.gravatar.com/avatar";

/// Registered user.
///
/// The user with the lowest id is the site administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique, sequential identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password: String,
}

impl User {
    /// Create a new, not yet persisted user.
    ///
    /// The password must already be hashed with
    /// `services::password::hash_password()`.
    pub fn new(name: impl Into<String>, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: 0, // Will be set by the database
            name: name.into(),
            email: email.into(),
            password: password_hash.into(),
        }
    }

    /// Avatar URL for this user
    pub fn avatar_url(&self) -> String {
        gravatar_url(&self.email)
    }
}

/// Build a gravatar URL (100px, rating g, retro fallback) for an email address.
pub fn gravatar_url(email: &str) -> String {
    let hash = format!("{:x}", md5::compute(email.trim().to_lowercase()));
    format!("{}/{}?s=100&d=retro&r=g", GRAVATAR_BASE, hash)
}
