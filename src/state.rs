use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::password::PasswordHasher;
use crate::auth::reset_token::ResetTokenCodec;
use crate::config::Config;
use crate::mail::Mailer;
use crate::pictures::ProfilePictures;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub hasher: PasswordHasher,
    pub tokens: ResetTokenCodec,
    pub pictures: ProfilePictures,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let hasher = PasswordHasher::new(config.auth.bcrypt_cost);
        let tokens = ResetTokenCodec::new(
            config.secret_key().as_bytes(),
            chrono::Duration::minutes(config.reset.token_ttl_minutes),
        );
        let pictures = ProfilePictures::new(config.pictures_path());
        Self {
            db,
            config,
            hasher,
            tokens,
            pictures,
            mailer,
        }
    }
}
