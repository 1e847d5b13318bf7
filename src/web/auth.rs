//! Authentication pages
//!
//! - GET/POST /register - Create an account and log in
//! - GET/POST /login - Start a session
//! - GET /logout - End the session

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use tera::Context as TeraContext;

use crate::models::Session;
use crate::services::{LoginInput, RegisterInput, UserServiceError};
use crate::web::error::WebError;
use crate::web::flash::redirect_with_flash;
use crate::web::middleware::{clear_session_cookie, extract_session_token, session_cookie, AppState};
use crate::web::page::PageContext;

pub const EMAIL_TAKEN_MESSAGE: &str = "You are already signed up with that email. Please log in!";
pub const UNKNOWN_EMAIL_MESSAGE: &str = "That email does not exist.";
pub const WRONG_PASSWORD_MESSAGE: &str = "Password is incorrect. Try again!";

/// Build the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_form).post(register))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
}

/// Redirect to `location` with a freshly started session
fn start_session(state: &AppState, session: &Session, location: &str) -> Response {
    let lifetime = state.user_service.session_lifetime();
    (
        AppendHeaders([(
            header::SET_COOKIE,
            session_cookie(&session.id, lifetime, state.secure_cookie),
        )]),
        Redirect::to(location),
    )
        .into_response()
}

/// GET /register
async fn register_form(State(state): State<AppState>, page: PageContext) -> Result<Response, WebError> {
    Ok(page.render(&state, StatusCode::OK, "register.html", &TeraContext::new())?)
}

/// POST /register
async fn register(
    State(state): State<AppState>,
    page: PageContext,
    Form(input): Form<RegisterInput>,
) -> Result<Response, WebError> {
    let mut context = TeraContext::new();
    context.insert("name", &input.name);
    context.insert("email", &input.email);

    match state.user_service.register(input).await {
        Ok(logged_in) => Ok(start_session(&state, &logged_in.session, "/")),
        Err(UserServiceError::EmailTaken(_)) => Ok(redirect_with_flash("/login", EMAIL_TAKEN_MESSAGE)),
        Err(UserServiceError::Validation(msg)) => {
            context.insert("form_error", &msg);
            Ok(page.render(&state, StatusCode::UNPROCESSABLE_ENTITY, "register.html", &context)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /login
async fn login_form(State(state): State<AppState>, page: PageContext) -> Result<Response, WebError> {
    Ok(page.render(&state, StatusCode::OK, "login.html", &TeraContext::new())?)
}

/// POST /login
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(input): Form<LoginInput>,
) -> Result<Response, WebError> {
    match state.user_service.login(input).await {
        Ok(logged_in) => {
            // The replaced session must not stay usable
            if let Some(previous) = extract_session_token(&headers) {
                state.user_service.logout(&previous).await?;
            }
            Ok(start_session(&state, &logged_in.session, "/"))
        }
        Err(UserServiceError::UnknownEmail(_)) => Ok(redirect_with_flash("/login", UNKNOWN_EMAIL_MESSAGE)),
        Err(UserServiceError::WrongPassword) => Ok(redirect_with_flash("/login", WRONG_PASSWORD_MESSAGE)),
        Err(e) => Err(e.into()),
    }
}

/// GET /logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, WebError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    Ok((
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie(state.secure_cookie))]),
        Redirect::to("/"),
    )
        .into_response())
}
