//! Web middleware
//!
//! Contains middleware for:
//! - Session loading (cookie token -> `CurrentUser` request extension)
//! - Authorization (administrator-only routes)
//!
//! Also owns the shared `AppState` and the session cookie helpers.

use anyhow::Context;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Duration;
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxCommentRepository, SqlxPostRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{CommentService, PostService, UserService};
use crate::theme::ThemeEngine;
use crate::web::error::WebError;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub theme: Arc<ThemeEngine>,
    /// Blog title shown on every page
    pub site_name: Arc<str>,
    /// Whether session cookies carry the `Secure` attribute
    pub secure_cookie: bool,
}

impl AppState {
    /// Wire repositories, services and the template engine on top of `pool`.
    pub fn from_pool(pool: DynDatabasePool, config: &Config) -> anyhow::Result<Self> {
        let user_service = UserService::with_session_expiration(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            config.session.expiration_days,
        );
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let comment_service =
            CommentService::new(SqlxCommentRepository::boxed(pool), post_repo.clone());
        let post_service = PostService::new(post_repo);

        let theme = ThemeEngine::new(config.theme.path.as_deref())
            .context("Failed to initialize templates")?;

        Ok(Self {
            user_service: Arc::new(user_service),
            post_service: Arc::new(post_service),
            comment_service: Arc::new(comment_service),
            theme: Arc::new(theme),
            site_name: Arc::from(config.theme.site_name.as_str()),
            secure_cookie: config.session.secure_cookie,
        })
    }
}

/// Logged-in user attached to the request by `load_current_user`
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub is_admin: bool,
}

/// Outcome of the administrator check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAccess {
    Granted,
    Anonymous,
    NotAdmin,
}

/// Decide whether the caller may use an administrator-only route
pub fn authorize_admin(current_user: Option<&CurrentUser>) -> AdminAccess {
    match current_user {
        None => AdminAccess::Anonymous,
        Some(current) if current.is_admin => AdminAccess::Granted,
        Some(_) => AdminAccess::NotAdmin,
    }
}

/// Value of the cookie `name`, if the request carries it
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

/// Session token from the `session` cookie. Other headers are never consulted.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE).filter(|token| !token.is_empty())
}

/// Session middleware
///
/// Resolves the session cookie and inserts a `CurrentUser` extension when it
/// belongs to a live session. Unknown or expired tokens leave the request
/// anonymous.
pub async fn load_current_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => match state.user_service.is_admin(user.id).await {
                Ok(is_admin) => {
                    request
                        .extensions_mut()
                        .insert(CurrentUser { user, is_admin });
                }
                Err(e) => tracing::warn!("Failed to resolve administrator: {}", e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("Session validation failed: {}", e),
        }
    }
    next.run(request).await
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, WebError> {
    match authorize_admin(request.extensions().get::<CurrentUser>()) {
        AdminAccess::Granted => Ok(next.run(request).await),
        AdminAccess::Anonymous => {
            tracing::debug!(path = %request.uri().path(), "Anonymous request to admin route");
            Err(WebError::Forbidden)
        }
        AdminAccess::NotAdmin => {
            tracing::warn!(path = %request.uri().path(), "Non-admin request to admin route");
            Err(WebError::Forbidden)
        }
    }
}

/// `Set-Cookie` value starting a session
pub fn session_cookie(token: &str, lifetime: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        lifetime.num_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value removing the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", Duration::zero(), secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use proptest::prelude::*;

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn current_user(id: i64, is_admin: bool) -> CurrentUser {
        CurrentUser {
            user: User {
                id,
                name: "User".to_string(),
                email: "user@example.com".to_string(),
                password: "hash".to_string(),
            },
            is_admin,
        }
    }

    #[test]
    fn test_extract_session_token_ignores_authorization_header() {
        let headers = headers_with(header::AUTHORIZATION, "Bearer abc123");
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let headers = headers_with(header::COOKIE, "flash=x; session=tok-1; other=y");
        assert_eq!(extract_session_token(&headers), Some("tok-1".to_string()));
    }

    #[test]
    fn test_extract_session_token_ignores_similar_names() {
        let headers = headers_with(header::COOKIE, "oldsession=nope");
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn test_extract_session_token_empty_cookie() {
        let headers = headers_with(header::COOKIE, "session=");
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn test_extract_session_token_none() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok", Duration::days(7), false);
        assert_eq!(cookie, "session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=604800");

        let secure = session_cookie("tok", Duration::days(1), true);
        assert!(secure.ends_with("; Secure"));
    }

    #[test]
    fn test_clear_session_cookie_expires_immediately() {
        let cookie = clear_session_cookie(false);
        assert!(cookie.starts_with("session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_authorize_admin_anonymous() {
        assert_eq!(authorize_admin(None), AdminAccess::Anonymous);
    }

    proptest! {
        #[test]
        fn property_only_admin_is_granted(id in 1i64..1000, is_admin in prop::bool::ANY) {
            let user = current_user(id, is_admin);
            let access = authorize_admin(Some(&user));
            if is_admin {
                prop_assert_eq!(access, AdminAccess::Granted);
            } else {
                prop_assert_eq!(access, AdminAccess::NotAdmin);
            }
        }

        #[test]
        fn property_cookie_lookup_finds_named_value(value in "[a-zA-Z0-9-]{1,40}") {
            let headers = headers_with(header::COOKIE, &format!("a=1; session={}; b=2", value));
            prop_assert_eq!(cookie_value(&headers, SESSION_COOKIE), Some(value));
        }
    }
}
