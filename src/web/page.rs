//! Per-request page rendering context

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use std::convert::Infallible;
use tera::Context as TeraContext;

use crate::theme::{StandardTemplateVars, TemplateUser};
use crate::web::flash::{read_flash, CLEAR_FLASH_COOKIE};
use crate::web::middleware::{AppState, CurrentUser};

/// Standard template variables for the current request.
///
/// Extracting a `PageContext` consumes any pending flash messages; the
/// rendered response clears the flash cookie.
pub struct PageContext {
    pub current_user: Option<CurrentUser>,
    vars: StandardTemplateVars,
}

/// Build the variables shared by every page
pub fn page_vars(
    site_name: &str,
    request_path: &str,
    current_user: Option<&CurrentUser>,
    flash_messages: Vec<String>,
) -> StandardTemplateVars {
    let vars = StandardTemplateVars::new(site_name, request_path).with_flash(flash_messages);
    match current_user {
        Some(current) => vars.with_user(
            TemplateUser {
                id: current.user.id,
                name: current.user.name.clone(),
            },
            current.is_admin,
        ),
        None => vars,
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current_user = parts.extensions.get::<CurrentUser>().cloned();
        let vars = page_vars(
            &state.site_name,
            parts.uri.path(),
            current_user.as_ref(),
            read_flash(&parts.headers),
        );
        Ok(Self { current_user, vars })
    }
}

impl PageContext {
    /// Render `template` with `context` plus the standard variables
    pub fn render(
        self,
        state: &AppState,
        status: StatusCode,
        template: &str,
        context: &TeraContext,
    ) -> anyhow::Result<Response> {
        let html = state
            .theme
            .render_with_standard_vars(template, context, &self.vars)?;

        let mut response = (status, Html(html)).into_response();
        if !self.vars.flash_messages.is_empty() {
            response.headers_mut().append(
                header::SET_COOKIE,
                HeaderValue::from_static(CLEAR_FLASH_COOKIE),
            );
        }
        Ok(response)
    }
}
