use askama::Template;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::routes::{Html, Layout};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("This username is taken")]
    DuplicateUsername,

    #[error("This email is taken")]
    DuplicateEmail,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Template)]
#[template(path = "pages/error.html")]
struct ErrorTemplate {
    layout: Layout,
    heading: &'static str,
    detail: &'static str,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateUsername | AppError::DuplicateEmail => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (heading, detail) = match &self {
            AppError::NotFound => (
                "Oops. Page Not Found (404)",
                "That page does not exist. Please try a different location.",
            ),
            AppError::Forbidden => (
                "You don't have permission to do that (403)",
                "Please check your account and try again.",
            ),
            AppError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                ("Bad request (400)", "The request could not be understood.")
            }
            AppError::DuplicateUsername | AppError::DuplicateEmail => (
                "Conflict (409)",
                "That username or email is already in use.",
            ),
            other => {
                tracing::error!(error = %other, "request failed");
                (
                    "Something went wrong (500)",
                    "We're experiencing some trouble on our end. Please try again in the near future.",
                )
            }
        };

        let page = ErrorTemplate {
            layout: Layout::bare(heading),
            heading,
            detail,
        };
        (status, Html(page)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
