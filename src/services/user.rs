//! User service
//!
//! Implements business logic for accounts and login state:
//! - Registration with unique emails
//! - Login/logout backed by database sessions
//! - Session validation and expiry
//! - Administrator lookup (the lowest user ID)

use crate::db::repositories::{is_unique_violation, SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::Duration;
use std::sync::Arc;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Maximum stored lengths, matching the `user` table columns.
const MAX_NAME_LEN: usize = 250;
const MAX_EMAIL_LEN: usize = 250;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Registration form failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Another account already uses this email
    #[error("Email already registered: {0}")]
    EmailTaken(String),

    /// No account has this email
    #[error("No account for email: {0}")]
    UnknownEmail(String),

    /// The password did not match
    #[error("Wrong password")]
    WrongPassword,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A user together with the session that was just started for them
#[derive(Debug, Clone)]
pub struct LoggedIn {
    pub user: User,
    pub session: Session,
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    /// Create a new user service with custom session expiration
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
        }
    }

    /// How long a new session stays valid
    pub fn session_lifetime(&self) -> Duration {
        Duration::days(self.session_expiration_days)
    }

    /// Register a new user and log them in.
    ///
    /// # Errors
    ///
    /// - `Validation` if a field is empty or the email is malformed
    /// - `EmailTaken` if the email is already registered; nothing is written
    /// - `InternalError` for database errors
    pub async fn register(&self, input: RegisterInput) -> Result<LoggedIn, UserServiceError> {
        let input = input.normalized();
        validate_register_input(&input)?;

        if self
            .user_repo
            .get_by_email(&input.email)
            .await
            .context("Failed to check existing email")?
            .is_some()
        {
            tracing::info!("Registration rejected, email already in use");
            return Err(UserServiceError::EmailTaken(input.email));
        }

        let password_hash = hash_password(&input.password)?;
        let user = User::new(input.name, input.email, password_hash);

        let user = match self.user_repo.create(&user).await {
            Ok(user) => user,
            // Lost a race with a concurrent registration of the same email
            Err(e) if is_unique_violation(&e) => {
                return Err(UserServiceError::EmailTaken(user.email));
            }
            Err(e) => return Err(e.context("Failed to create user").into()),
        };

        tracing::info!(user_id = user.id, "Registered new user");

        let session = self.create_session(user.id).await?;
        Ok(LoggedIn { user, session })
    }

    /// Verify credentials and start a new session.
    ///
    /// # Errors
    ///
    /// - `UnknownEmail` if no account uses the email
    /// - `WrongPassword` if the password does not match
    /// - `InternalError` for database or hashing errors
    pub async fn login(&self, input: LoginInput) -> Result<LoggedIn, UserServiceError> {
        let email = normalize_email(&input.email);

        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
            .ok_or_else(|| {
                tracing::warn!("Login failed: unknown email");
                UserServiceError::UnknownEmail(email.clone())
            })?;

        let password_valid =
            verify_password(&input.password, &user.password).context("Failed to verify password")?;

        if !password_valid {
            tracing::warn!(user_id = user.id, "Login failed: wrong password");
            return Err(UserServiceError::WrongPassword);
        }

        let session = self.create_session(user.id).await?;
        tracing::info!(user_id = user.id, "User logged in");

        Ok(LoggedIn { user, session })
    }

    /// Invalidate a session. Unknown tokens are ignored.
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;

        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Returns `None` for unknown tokens and for expired sessions, which are
    /// deleted on sight.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// ID of the administrator, the first registered user
    pub async fn admin_id(&self) -> Result<Option<i64>, UserServiceError> {
        Ok(self
            .user_repo
            .first_user_id()
            .await
            .context("Failed to look up administrator")?)
    }

    /// Whether `user_id` is the administrator
    pub async fn is_admin(&self, user_id: i64) -> Result<bool, UserServiceError> {
        Ok(self.admin_id().await? == Some(user_id))
    }

    /// Delete all expired sessions, returning how many were removed.
    ///
    /// Called periodically from a background task.
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;

        Ok(count)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let session = Session::start(user_id, self.session_lifetime());

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(created)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_register_input(input: &RegisterInput) -> Result<(), UserServiceError> {
    if input.name.is_empty() {
        return Err(UserServiceError::Validation("Name cannot be empty".to_string()));
    }
    if input.name.chars().count() > MAX_NAME_LEN {
        return Err(UserServiceError::Validation("Name is too long".to_string()));
    }
    if input.email.is_empty() {
        return Err(UserServiceError::Validation("Email cannot be empty".to_string()));
    }
    if input.email.chars().count() > MAX_EMAIL_LEN {
        return Err(UserServiceError::Validation("Email is too long".to_string()));
    }
    if !input.email.contains('@') {
        return Err(UserServiceError::Validation("Invalid email format".to_string()));
    }
    if input.password.is_empty() {
        return Err(UserServiceError::Validation("Password cannot be empty".to_string()));
    }
    Ok(())
}

/// Input for user registration
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterInput {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: normalize_email(&self.email),
            password: self.password,
        }
    }
}

/// Input for user login
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use proptest::prelude::*;

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let service = UserService::new(user_repo, session_repo);

        (pool, service)
    }

    async fn user_rows(pool: &DynDatabasePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM user")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    #[tokio::test]
    async fn test_register_creates_user_and_session() {
        let (_pool, service) = setup_test_service().await;

        let logged_in = service
            .register(RegisterInput::new("Ada", "ada@example.com", "password123"))
            .await
            .expect("Failed to register");

        assert!(logged_in.user.id > 0);
        assert_eq!(logged_in.user.name, "Ada");
        assert_eq!(logged_in.session.user_id, logged_in.user.id);
        assert_ne!(logged_in.user.password, "password123");
    }

    #[tokio::test]
    async fn test_register_duplicate_email_keeps_single_row() {
        let (pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("Ada", "same@example.com", "password123"))
            .await
            .expect("Failed to register first user");

        let result = service
            .register(RegisterInput::new("Eve", "same@example.com", "other"))
            .await;

        assert!(matches!(result, Err(UserServiceError::EmailTaken(_))));
        assert_eq!(user_rows(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_case_insensitive() {
        let (pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("Ada", "ada@example.com", "password123"))
            .await
            .unwrap();

        let result = service
            .register(RegisterInput::new("Ada", "  ADA@Example.com ", "password123"))
            .await;

        assert!(matches!(result, Err(UserServiceError::EmailTaken(_))));
        assert_eq!(user_rows(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (pool, service) = setup_test_service().await;

        for input in [
            RegisterInput::new("", "a@example.com", "pw"),
            RegisterInput::new("Ada", "", "pw"),
            RegisterInput::new("Ada", "not-an-email", "pw"),
            RegisterInput::new("Ada", "a@example.com", ""),
        ] {
            let result = service.register(input).await;
            assert!(matches!(result, Err(UserServiceError::Validation(_))));
        }
        assert_eq!(user_rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_register_email_length_limit() {
        let (pool, service) = setup_test_service().await;
        let longest = format!("{}@example.com", "a".repeat(238));
        let too_long = format!("{}@example.com", "b".repeat(239));
        assert_eq!(longest.len(), 250);

        service
            .register(RegisterInput::new("Ada", longest.as_str(), "pw"))
            .await
            .expect("A 250-character email fits the column");
        let result = service.register(RegisterInput::new("Bob", too_long.as_str(), "pw")).await;

        assert!(matches!(result, Err(UserServiceError::Validation(_))));
        assert_eq!(user_rows(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_register_name_length_limit() {
        let (pool, service) = setup_test_service().await;

        service
            .register(RegisterInput::new("n".repeat(250), "ada@example.com", "pw"))
            .await
            .expect("A 250-character name fits the column");
        let result = service
            .register(RegisterInput::new("n".repeat(251), "bob@example.com", "pw"))
            .await;

        assert!(matches!(result, Err(UserServiceError::Validation(_))));
        assert_eq!(user_rows(&pool).await, 1);
    }

    // ========================================================================
    // Login / logout
    // ========================================================================

    #[tokio::test]
    async fn test_login_success() {
        let (_pool, service) = setup_test_service().await;
        let registered = service
            .register(RegisterInput::new("Ada", "ada@example.com", "password123"))
            .await
            .unwrap();

        let logged_in = service
            .login(LoginInput::new("ada@example.com", "password123"))
            .await
            .expect("Login should succeed");

        assert_eq!(logged_in.user.id, registered.user.id);
        assert_ne!(logged_in.session.id, registered.session.id);
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let (_pool, service) = setup_test_service().await;

        let result = service
            .login(LoginInput::new("ghost@example.com", "password123"))
            .await;

        assert!(matches!(result, Err(UserServiceError::UnknownEmail(_))));
    }

    #[tokio::test]
    async fn test_login_wrong_password_creates_no_session() {
        let (pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("Ada", "ada@example.com", "password123"))
            .await
            .unwrap();

        let result = service
            .login(LoginInput::new("ada@example.com", "wrong"))
            .await;

        assert!(matches!(result, Err(UserServiceError::WrongPassword)));
        let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(sessions, 1, "Only the registration session should exist");
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let (_pool, service) = setup_test_service().await;
        let logged_in = service
            .register(RegisterInput::new("Ada", "ada@example.com", "password123"))
            .await
            .unwrap();

        service.logout(&logged_in.session.id).await.expect("Logout failed");

        let user = service.validate_session(&logged_in.session.id).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_logout_unknown_session_succeeds() {
        let (_pool, service) = setup_test_service().await;

        assert!(service.logout("no-such-session").await.is_ok());
    }

    // ========================================================================
    // Sessions and admin
    // ========================================================================

    #[tokio::test]
    async fn test_validate_session() {
        let (_pool, service) = setup_test_service().await;
        let logged_in = service
            .register(RegisterInput::new("Ada", "ada@example.com", "password123"))
            .await
            .unwrap();

        let user = service
            .validate_session(&logged_in.session.id)
            .await
            .expect("Validation should not error")
            .expect("Session should be valid");

        assert_eq!(user.id, logged_in.user.id);
        assert!(service.validate_session("bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_deleted() {
        let (pool, _) = setup_test_service().await;
        let service = UserService::with_session_expiration(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            -1,
        );
        let logged_in = service
            .register(RegisterInput::new("Ada", "ada@example.com", "password123"))
            .await
            .unwrap();

        let user = service.validate_session(&logged_in.session.id).await.unwrap();

        assert!(user.is_none());
        let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(sessions, 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let (pool, _) = setup_test_service().await;
        let service = UserService::with_session_expiration(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            -1,
        );
        service
            .register(RegisterInput::new("Ada", "ada@example.com", "pw"))
            .await
            .unwrap();
        service.login(LoginInput::new("ada@example.com", "pw")).await.unwrap();

        let removed = service.cleanup_expired_sessions().await.unwrap();

        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn test_first_user_is_admin() {
        let (pool, service) = setup_test_service().await;
        assert_eq!(service.admin_id().await.unwrap(), None);

        let first = service
            .register(RegisterInput::new("Ada", "ada@example.com", "pw"))
            .await
            .unwrap();
        let second = service
            .register(RegisterInput::new("Bob", "bob@example.com", "pw"))
            .await
            .unwrap();

        assert!(service.is_admin(first.user.id).await.unwrap());
        assert!(!service.is_admin(second.user.id).await.unwrap());
        assert_eq!(user_rows(&pool).await, 2);
    }

    // ========================================================================
    // Property tests
    // ========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(10))]

        /// Any registered credentials log in again and resolve to the same user.
        #[test]
        fn prop_register_login_roundtrip(
            name in "[A-Za-z]{1,12}",
            local in "[a-z0-9]{1,10}",
            password in "[a-zA-Z0-9!@#$%^&*]{1,20}"
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let (_pool, service) = setup_test_service().await;
                let email = format!("{}@example.com", local);

                let registered = service
                    .register(RegisterInput::new(name.clone(), email.clone(), password.clone()))
                    .await
                    .expect("Registration should succeed");
                let logged_in = service
                    .login(LoginInput::new(email, password.clone()))
                    .await
                    .expect("Login should succeed");
                let resolved = service
                    .validate_session(&logged_in.session.id)
                    .await
                    .expect("Validation should not error")
                    .expect("Session should resolve");

                prop_assert_eq!(resolved.id, registered.user.id);
                prop_assert_eq!(resolved.name, name);
                Ok(())
            });
            result?;
        }

        /// A password that differs from the registered one never logs in.
        #[test]
        fn prop_wrong_password_rejected(
            password in "[a-z]{4,12}",
            suffix in "[A-Z0-9]{1,4}"
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let (_pool, service) = setup_test_service().await;
                service
                    .register(RegisterInput::new("Ada", "ada@example.com", password.clone()))
                    .await
                    .expect("Registration should succeed");

                let attempt = service
                    .login(LoginInput::new("ada@example.com", format!("{}{}", password, suffix)))
                    .await;

                prop_assert!(matches!(attempt, Err(UserServiceError::WrongPassword)));
                Ok(())
            });
            result?;
        }
    }
}
