pub mod guard;
pub mod handlers;
pub mod password;
pub mod reset_token;
pub mod session;
