//! One-shot notices carried across a redirect in a cookie.
//!
//! A handler that redirects attaches its notices with [`redirect`]. The next
//! rendered page reads them through [`crate::extractors::PageContext`], and
//! [`sweep`] clears the cookie on that page's response.

use std::fmt;

use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::extractors::cookie_value;

pub const FLASH_COOKIE: &str = "inkpost_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Success,
    Info,
    Warning,
    Danger,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Success => "success",
            Category::Info => "info",
            Category::Warning => "warning",
            Category::Danger => "danger",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: Category,
    pub message: String,
}

impl Flash {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Cookie-safe encoding of a list of notices.
pub fn encode(flashes: &[Flash]) -> String {
    let json = serde_json::to_vec(flashes).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a cookie value; anything unreadable is dropped.
pub fn decode(value: &str) -> Vec<Flash> {
    URL_SAFE_NO_PAD
        .decode(value)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

pub fn set_cookie(flashes: &[Flash]) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/",
        FLASH_COOKIE,
        encode(flashes)
    )
}

pub fn clear_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", FLASH_COOKIE)
}

/// Redirect to `to` carrying a single notice.
pub fn redirect(to: &str, category: Category, message: impl Into<String>) -> Response {
    let flash = Flash::new(category, message);
    (
        [(header::SET_COOKIE, set_cookie(std::slice::from_ref(&flash)))],
        Redirect::to(to),
    )
        .into_response()
}

/// Clear pending notices once a non-redirect response has been produced for them.
pub async fn sweep(req: Request, next: Next) -> Response {
    let pending = cookie_value(req.headers(), FLASH_COOKIE).is_some_and(|v| !v.is_empty());
    let mut response = next.run(req).await;

    let sets_own = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(FLASH_COOKIE));

    if pending && !sets_own && !response.status().is_redirection() {
        if let Ok(value) = clear_cookie().parse() {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}
