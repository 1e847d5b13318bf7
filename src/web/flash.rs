//! One-shot flash messages
//!
//! A message set on a redirect is carried in the `flash` cookie and shown on
//! the next rendered page, which then clears the cookie.

use axum::{
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};

use crate::web::middleware::cookie_value;

/// Name of the cookie carrying pending messages
pub const FLASH_COOKIE: &str = "flash";

/// `Set-Cookie` value removing the flash cookie
pub const CLEAR_FLASH_COOKIE: &str = "flash=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";

/// Messages are joined with newlines before URL-encoding
const SEPARATOR: &str = "\n";

/// `Set-Cookie` value carrying `messages` to the next page
pub fn flash_cookie(messages: &[&str]) -> String {
    let joined = messages.join(SEPARATOR);
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        FLASH_COOKIE,
        urlencoding::encode(&joined)
    )
}

/// Pending messages from the request's flash cookie
pub fn read_flash(headers: &HeaderMap) -> Vec<String> {
    let Some(raw) = cookie_value(headers, FLASH_COOKIE) else {
        return Vec::new();
    };

    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded
            .split(SEPARATOR)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) => {
            tracing::debug!("Ignoring malformed flash cookie: {}", e);
            Vec::new()
        }
    }
}

/// Redirect to `location`, showing `message` on the page it lands on
pub fn redirect_with_flash(location: &str, message: &str) -> Response {
    (
        AppendHeaders([(header::SET_COOKIE, flash_cookie(&[message]))]),
        Redirect::to(location),
    )
        .into_response()
}
