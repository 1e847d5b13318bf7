//! Web layer - HTML pages and routing
//!
//! Every route renders a Tera template or redirects. Login state travels in
//! the `session` cookie and is resolved once per request by
//! `middleware::load_current_user`; post management routes sit behind
//! `middleware::require_admin`.

pub mod auth;
pub mod error;
pub mod flash;
pub mod middleware;
pub mod page;
pub mod pages;
pub mod posts;

use axum::{middleware as axum_middleware, Router};
use std::path::Path;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

pub use error::WebError;
pub use middleware::{AdminAccess, AppState, CurrentUser};

/// Build the complete router with middleware
///
/// `static_path` is served under `/static`.
pub fn build_router(state: AppState, static_path: &Path) -> Router {
    let admin_routes = posts::admin_router()
        .route_layer(axum_middleware::from_fn(middleware::require_admin));

    Router::new()
        .merge(posts::public_router())
        .merge(auth::router())
        .merge(pages::router())
        .merge(admin_routes)
        .nest_service("/static", ServeDir::new(static_path))
        .fallback(error::not_found)
        // Error pages see the CurrentUser extension, so this must stay inside load_current_user
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            error::render_error_pages,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_current_user,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}
