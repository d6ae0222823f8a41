pub mod assets;
pub mod home;
pub mod posts;
pub mod users;

use askama::Template;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{guard, handlers};
use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::flash::{self, Flash};
use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Data shared by every page through `base.html`.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub title: Option<String>,
    pub user: Option<CurrentUser>,
    pub flashes: Vec<Flash>,
}

impl Layout {
    /// A layout with a title and nothing else, for pages rendered outside a handler.
    pub fn bare(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Self::default()
        }
    }

    pub fn page_title(&self) -> String {
        match &self.title {
            Some(title) => format!("Inkpost - {}", title),
            None => "Inkpost".to_string(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(home::index))
        .route("/home", get(home::index))
        .route("/about", get(home::about))
        .route("/post/{id}", get(posts::show))
        .route("/user/{username}", get(users::user_posts))
        .route("/logout", get(handlers::logout))
        .route("/assets/{*path}", get(assets::serve));

    let anonymous = Router::new()
        .route(
            "/register",
            get(handlers::register_page).post(handlers::register),
        )
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::anonymous_only,
        ));

    let reset = Router::new()
        .route(
            "/reset_password",
            get(handlers::reset_request_page).post(handlers::reset_request),
        )
        .route(
            "/reset_password/{token}",
            get(handlers::reset_token_page).post(handlers::reset_token),
        );

    let protected = Router::new()
        .route(
            "/account",
            get(users::account_page)
                .post(users::update_account)
                .layer(DefaultBodyLimit::max(state.config.storage.max_upload_bytes)),
        )
        .route("/post/new", get(posts::new_page).post(posts::create))
        .route(
            "/post/{id}/update",
            get(posts::edit_page).post(posts::update),
        )
        .route("/post/{id}/delete", post(posts::delete))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_authenticated,
        ));

    Router::new()
        .merge(public)
        .merge(anonymous)
        .merge(reset)
        .merge(protected)
        .nest_service("/static/profile_pics", ServeDir::new(state.pictures.root()))
        .fallback(not_found)
        .layer(middleware::from_fn(flash::sweep))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}
