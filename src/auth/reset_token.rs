//! Password-reset tokens.
//!
//! A token is `base64url(payload) "." base64url(mac)` where the payload is
//! `"{user_id}:{expires_at_unix}"` and the mac is HMAC-SHA256 over the payload
//! with the process-wide secret. Nothing is stored server-side: a token stays
//! usable until it expires, and every way it can fail looks the same to the caller.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::db::models::User;
use crate::db::users;
use crate::error::AppResult;
use crate::state::DbPool;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct ResetTokenCodec {
    secret: Vec<u8>,
    default_ttl: Duration,
}

impl ResetTokenCodec {
    pub fn new(secret: &[u8], default_ttl: Duration) -> Self {
        Self {
            secret: secret.to_vec(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn issue(&self, user_id: i64, ttl: Duration) -> String {
        self.issue_at(user_id, Utc::now() + ttl)
    }

    fn issue_at(&self, user_id: i64, expires_at: DateTime<Utc>) -> String {
        let payload = format!("{}:{}", user_id, expires_at.timestamp());
        let signature = self.sign(payload.as_bytes());
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.secret).expect("HMAC key of any size")
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    /// Check signature and expiry against `now`, yielding the bound user id.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Option<i64> {
        let (payload_b64, signature_b64) = token.split_once('.')?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;

        let mut mac = self.mac();
        mac.update(&payload);
        mac.verify_slice(&signature).ok()?;

        let payload = String::from_utf8(payload).ok()?;
        let (user_id, expires_at) = payload.split_once(':')?;
        let user_id: i64 = user_id.parse().ok()?;
        let expires_at: i64 = expires_at.parse().ok()?;

        (now.timestamp() < expires_at).then_some(user_id)
    }

    /// Resolve a token to its user. Forged, expired and orphaned tokens all give `None`.
    pub fn verify(&self, pool: &DbPool, token: &str) -> AppResult<Option<User>> {
        let Some(user_id) = self.decode(token, Utc::now()) else {
            tracing::debug!("reset token rejected");
            return Ok(None);
        };
        users::find_by_id(pool, user_id)
    }
}
