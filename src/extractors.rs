use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};

use crate::auth::session;
use crate::error::AppError;
use crate::flash::{self, Flash, FLASH_COOKIE};
use crate::routes::Layout;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub image_file: String,
}

/// Extractor that requires an authenticated caller.
/// Routes behind [`crate::auth::guard::require_authenticated`] always satisfy it;
/// anywhere else a missing session is rejected as forbidden.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await?.0 {
            Some(user) => Ok(user),
            None => Err(AppError::Forbidden),
        }
    }
}

/// Optional user extractor: `None` for anonymous callers.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(MaybeUser(Some(user.clone())));
        }

        let Some(token) = cookie_value(&parts.headers, &state.config.auth.cookie_name) else {
            return Ok(MaybeUser(None));
        };
        let user = session::find_session_user(&state.db, token)?;
        if let Some(ref user) = user {
            parts.extensions.insert(user.clone());
        }
        Ok(MaybeUser(user))
    }
}

/// Everything the shared page layout needs: the caller and pending flash notices.
pub struct PageContext {
    pub user: Option<CurrentUser>,
    pub flashes: Vec<Flash>,
}

impl PageContext {
    pub fn layout(&self, title: impl Into<String>) -> Layout {
        Layout {
            title: Some(title.into()),
            user: self.user.clone(),
            flashes: self.flashes.clone(),
        }
    }

    /// Layout for pages that use the site name as their title.
    pub fn untitled(&self) -> Layout {
        Layout {
            title: None,
            user: self.user.clone(),
            flashes: self.flashes.clone(),
        }
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;
        let flashes = cookie_value(&parts.headers, FLASH_COOKIE)
            .map(flash::decode)
            .unwrap_or_default();
        Ok(PageContext { user, flashes })
    }
}

/// Look up a cookie by name across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}
