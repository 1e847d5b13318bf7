//! Post pages
//!
//! Public:
//! - GET / - All posts, newest first
//! - GET /post/{id} - One post with its comments
//! - POST /post/{id} - Add a comment (requires login)
//!
//! Administrator only:
//! - GET/POST /new-post
//! - GET/POST /edit-post/{id}
//! - GET /delete/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Extension, Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::models::PostInput;
use crate::services::comment::validate_comment_text;
use crate::services::{CommentServiceError, PostServiceError};
use crate::web::error::WebError;
use crate::web::flash::redirect_with_flash;
use crate::web::middleware::{AppState, CurrentUser};
use crate::web::page::PageContext;

pub const LOGIN_TO_COMMENT_MESSAGE: &str = "Please log in to comment.";

/// Comment form as submitted from the post page
#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub comment_text: String,
}

/// Routes open to everyone
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/post/{id}", get(show_post).post(add_comment))
}

/// Routes that must be wrapped in `require_admin`
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/new-post", get(new_post_form).post(create_post))
        .route("/edit-post/{id}", get(edit_post_form).post(update_post))
        .route("/delete/{id}", get(delete_post))
}

/// GET /
async fn index(State(state): State<AppState>, page: PageContext) -> Result<Response, WebError> {
    let posts = state.post_service.list().await?;

    let mut context = TeraContext::new();
    context.insert("posts", &posts);
    Ok(page.render(&state, StatusCode::OK, "index.html", &context)?)
}

/// Render the post page, optionally with a rejected comment
async fn render_post(
    state: &AppState,
    page: PageContext,
    id: i64,
    status: StatusCode,
    comment_error: Option<(&str, &str)>,
) -> Result<Response, WebError> {
    let post = state.post_service.get_with_author(id).await?;
    let comments = state.comment_service.list_for_post(id).await?;

    let mut context = TeraContext::new();
    context.insert("post", &post);
    context.insert("comments", &comments);
    if let Some((message, text)) = comment_error {
        context.insert("comment_error", message);
        context.insert("comment_text", text);
    }
    Ok(page.render(state, status, "post.html", &context)?)
}

/// GET /post/{id}
async fn show_post(
    State(state): State<AppState>,
    page: PageContext,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    render_post(&state, page, id, StatusCode::OK, None).await
}

/// POST /post/{id}
async fn add_comment(
    State(state): State<AppState>,
    page: PageContext,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Response, WebError> {
    // Unknown posts are a 404 whatever the form holds
    state.post_service.get(id).await?;

    if let Err(CommentServiceError::Validation(msg)) = validate_comment_text(&form.comment_text) {
        return render_post(
            &state,
            page,
            id,
            StatusCode::UNPROCESSABLE_ENTITY,
            Some((msg.as_str(), form.comment_text.as_str())),
        )
        .await;
    }

    let Some(current) = page.current_user else {
        return Ok(redirect_with_flash("/login", LOGIN_TO_COMMENT_MESSAGE));
    };

    state
        .comment_service
        .add(id, current.user.id, &form.comment_text)
        .await?;

    Ok(Redirect::to(&format!("/post/{}", id)).into_response())
}

/// Render the post editor
fn render_editor(
    state: &AppState,
    page: PageContext,
    status: StatusCode,
    form: &PostInput,
    post_id: Option<i64>,
    form_error: Option<&str>,
) -> Result<Response, WebError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("is_edit", &post_id.is_some());
    if let Some(id) = post_id {
        context.insert("post_id", &id);
    }
    if let Some(message) = form_error {
        context.insert("form_error", message);
    }
    Ok(page.render(state, status, "make-post.html", &context)?)
}

/// Re-render the editor for a rejected submission, or pass the error on
fn rejected_post(
    state: &AppState,
    page: PageContext,
    form: &PostInput,
    post_id: Option<i64>,
    err: PostServiceError,
) -> Result<Response, WebError> {
    match err {
        PostServiceError::Validation(msg) => render_editor(
            state,
            page,
            StatusCode::UNPROCESSABLE_ENTITY,
            form,
            post_id,
            Some(&msg),
        ),
        PostServiceError::DuplicateTitle(_) => render_editor(
            state,
            page,
            StatusCode::CONFLICT,
            form,
            post_id,
            Some("A post with this title already exists."),
        ),
        other => Err(other.into()),
    }
}

/// GET /new-post
async fn new_post_form(State(state): State<AppState>, page: PageContext) -> Result<Response, WebError> {
    render_editor(&state, page, StatusCode::OK, &PostInput::default(), None, None)
}

/// POST /new-post
async fn create_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    page: PageContext,
    Form(input): Form<PostInput>,
) -> Result<Response, WebError> {
    match state.post_service.create(input.clone(), current.user.id).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(e) => rejected_post(&state, page, &input, None, e),
    }
}

/// GET /edit-post/{id}
async fn edit_post_form(
    State(state): State<AppState>,
    page: PageContext,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let post = state.post_service.get(id).await?;
    render_editor(&state, page, StatusCode::OK, &PostInput::from_post(&post), Some(id), None)
}

/// POST /edit-post/{id}
async fn update_post(
    State(state): State<AppState>,
    page: PageContext,
    Path(id): Path<i64>,
    Form(input): Form<PostInput>,
) -> Result<Response, WebError> {
    match state.post_service.update(id, input.clone()).await {
        Ok(_) => Ok(Redirect::to(&format!("/post/{}", id)).into_response()),
        Err(e) => rejected_post(&state, page, &input, Some(id), e),
    }
}

/// GET /delete/{id}
async fn delete_post(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, WebError> {
    state.post_service.delete(id).await?;
    Ok(Redirect::to("/").into_response())
}
