use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile image assigned to every new account. Never deleted from storage.
pub const DEFAULT_IMAGE: &str = "default.jpg";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub image_file: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub date_posted: DateTime<Utc>,
    pub user_id: i64,
}

/// A post joined with the author fields the pages display.
#[derive(Debug, Clone, Serialize)]
pub struct PostWithAuthor {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub date_posted: DateTime<Utc>,
    pub user_id: i64,
    pub author_username: String,
    pub author_image: String,
}

impl PostWithAuthor {
    pub fn date_display(&self) -> String {
        self.date_posted.format("%Y-%m-%d").to_string()
    }
}
