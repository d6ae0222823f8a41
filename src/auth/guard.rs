//! Route guards, layered onto route groups in [`crate::routes::build_router`].

use axum::extract::{FromRequestParts, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::extractors::MaybeUser;
use crate::flash::{self, Category};
use crate::state::AppState;

/// Let authenticated callers through with [`crate::extractors::CurrentUser`] in the
/// request extensions; send everyone else to the login page, remembering where they were going.
pub async fn require_authenticated(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();
    match MaybeUser::from_request_parts(&mut parts, &state).await {
        Ok(MaybeUser(Some(_))) => next.run(Request::from_parts(parts, body)).await,
        Ok(MaybeUser(None)) => {
            let target = parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            flash::redirect(
                &login_location(target),
                Category::Info,
                "Please log in to access this page.",
            )
        }
        Err(e) => e.into_response(),
    }
}

/// Keep signed-in callers away from the login and registration pages.
pub async fn anonymous_only(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();
    match MaybeUser::from_request_parts(&mut parts, &state).await {
        Ok(MaybeUser(None)) => next.run(Request::from_parts(parts, body)).await,
        Ok(MaybeUser(Some(_))) => Redirect::to("/").into_response(),
        Err(e) => e.into_response(),
    }
}

/// Login page URL that returns to `target` afterwards.
pub fn login_location(target: &str) -> String {
    format!("/login?next={}", urlencoding::encode(target))
}

/// Accept only same-site paths as post-login targets.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}
