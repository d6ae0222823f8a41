// Library exports for Inkpost
// This allows integration tests and the binary to share the application modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod flash;
pub mod forms;
pub mod mail;
pub mod pictures;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
