use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
///
/// Expired sessions are purged first, so the table only grows with live logins.
pub fn create_session(pool: &DbPool, user_id: i64, hours: u64) -> AppResult<String> {
    purge_expired(pool)?;
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Resolve a session token to its user, ignoring expired sessions.
pub fn find_session_user(pool: &DbPool, token: &str) -> AppResult<Option<CurrentUser>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT u.id, u.username, u.email, u.image_file FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| {
                Ok(CurrentUser {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                    image_file: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Drop every session whose expiry has passed. Returns the number removed.
pub fn purge_expired(pool: &DbPool) -> AppResult<usize> {
    let conn = pool.get()?;
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?;
    if removed > 0 {
        tracing::debug!(removed, "purged expired sessions");
    }
    Ok(removed)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::users::create_user;

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn session_resolves_until_deleted() {
        let pool = test_pool();
        let user = create_user(&pool, "alice", "alice@example.com", "hash").unwrap();
        let token = create_session(&pool, user.id, 1).unwrap();

        let current = find_session_user(&pool, &token).unwrap().unwrap();
        assert_eq!(current.id, user.id);
        assert_eq!(current.username, "alice");

        delete_session(&pool, &token).unwrap();
        assert!(find_session_user(&pool, &token).unwrap().is_none());
    }

    #[test]
    fn expired_session_is_ignored() {
        let pool = test_pool();
        let user = create_user(&pool, "alice", "alice@example.com", "hash").unwrap();
        let token = create_session(&pool, user.id, 0).unwrap();
        assert!(find_session_user(&pool, &token).unwrap().is_none());
    }

    fn session_rows(pool: &DbPool, token: &str) -> i64 {
        pool.get()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM sessions WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn new_login_purges_expired_sessions() {
        let pool = test_pool();
        let user = create_user(&pool, "alice", "alice@example.com", "hash").unwrap();
        let stale = create_session(&pool, user.id, 0).unwrap();
        let live = create_session(&pool, user.id, 1).unwrap();
        assert_eq!(session_rows(&pool, &stale), 0);
        assert_eq!(session_rows(&pool, &live), 1);

        assert_eq!(purge_expired(&pool).unwrap(), 0);
        assert_eq!(session_rows(&pool, &live), 1);
    }
}
