//! Web error type and themed error pages
//!
//! Handlers return `WebError`, which turns into a bare response tagged with
//! an `ErrorPage` extension. The `render_error_pages` middleware then swaps
//! the body for the site's `error.html`.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use tera::Context as TeraContext;

use crate::services::{CommentServiceError, PostServiceError, UserServiceError};
use crate::theme::simple_error_page;
use crate::web::middleware::{AppState, CurrentUser};
use crate::web::page::page_vars;

/// Errors surfaced to the browser as an error page
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is anonymous or not the administrator
    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Details of an error response, rendered by `render_error_pages`
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub title: &'static str,
    pub message: String,
}

impl WebError {
    fn page(&self) -> ErrorPage {
        match self {
            WebError::NotFound(what) => ErrorPage {
                status: StatusCode::NOT_FOUND,
                title: "Page not found",
                message: format!("{} could not be found.", what),
            },
            WebError::Forbidden => ErrorPage {
                status: StatusCode::FORBIDDEN,
                title: "Forbidden",
                message: "Only the administrator can do that.".to_string(),
            },
            WebError::BadRequest(message) => ErrorPage {
                status: StatusCode::BAD_REQUEST,
                title: "Bad request",
                message: message.clone(),
            },
            WebError::Internal(_) => ErrorPage {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                title: "Something went wrong",
                message: "The page could not be displayed.".to_string(),
            },
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        if let WebError::Internal(ref e) = self {
            tracing::error!("Request failed: {:#}", e);
        }

        let page = self.page();
        let mut response = (
            page.status,
            Html(simple_error_page(page.title, &page.message)),
        )
            .into_response();
        response.extensions_mut().insert(page);
        response
    }
}

impl From<PostServiceError> for WebError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(id) => WebError::NotFound(format!("Post {}", id)),
            PostServiceError::Validation(msg) => WebError::BadRequest(msg),
            PostServiceError::DuplicateTitle(title) => {
                WebError::BadRequest(format!("A post titled '{}' already exists", title))
            }
            PostServiceError::InternalError(e) => WebError::Internal(e),
        }
    }
}

impl From<CommentServiceError> for WebError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(id) => WebError::NotFound(format!("Post {}", id)),
            CommentServiceError::Validation(msg) => WebError::BadRequest(msg),
            CommentServiceError::InternalError(e) => WebError::Internal(e),
        }
    }
}

impl From<UserServiceError> for WebError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InternalError(e) => WebError::Internal(e),
            other => WebError::BadRequest(other.to_string()),
        }
    }
}

/// Error page middleware
///
/// Replaces the body of any response carrying an `ErrorPage` with the
/// themed `error.html`. The plain page built by `WebError` stays in place if
/// the template cannot be rendered.
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let vars = page_vars(
        &state.site_name,
        request.uri().path(),
        request.extensions().get::<CurrentUser>(),
        Vec::new(),
    );

    let mut response = next.run(request).await;
    let Some(page) = response.extensions_mut().remove::<ErrorPage>() else {
        return response;
    };

    let mut context = TeraContext::new();
    context.insert("status_code", &page.status.as_u16());
    context.insert("error_title", page.title);
    context.insert("error_message", &page.message);

    match state
        .theme
        .render_with_standard_vars("error.html", &context, &vars)
    {
        Ok(html) => {
            response.headers_mut().remove(header::CONTENT_LENGTH);
            *response.body_mut() = Body::from(html);
        }
        Err(e) => tracing::warn!("Failed to render error template: {}", e),
    }
    response
}

/// Fallback for unknown routes
pub async fn not_found() -> WebError {
    WebError::NotFound("The requested page".to_string())
}
