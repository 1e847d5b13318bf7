//! Static pages

use axum::{extract::State, http::StatusCode, response::Response, routing::get, Router};
use tera::Context as TeraContext;

use crate::web::error::WebError;
use crate::web::middleware::AppState;
use crate::web::page::PageContext;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/about", get(about))
        .route("/contact", get(contact))
}

async fn about(State(state): State<AppState>, page: PageContext) -> Result<Response, WebError> {
    Ok(page.render(&state, StatusCode::OK, "about.html", &TeraContext::new())?)
}

async fn contact(State(state): State<AppState>, page: PageContext) -> Result<Response, WebError> {
    Ok(page.render(&state, StatusCode::OK, "contact.html", &TeraContext::new())?)
}
