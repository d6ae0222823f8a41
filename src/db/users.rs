//! Credential store: user identity records.
//!
//! Uniqueness of `username` and `email` is checked up front so the caller gets a
//! precise error, and the UNIQUE constraints on the table catch whatever slips
//! through a concurrent registration.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

const USER_COLUMNS: &str = "id, username, email, image_file, password_hash";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        image_file: row.get(3)?,
        password_hash: row.get(4)?,
    })
}

fn find_one(conn: &Connection, column: &str, value: &dyn rusqlite::ToSql) -> AppResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let user = conn
        .query_row(&sql, params![value], user_from_row)
        .optional()?;
    Ok(user)
}

pub fn find_by_id(pool: &DbPool, id: i64) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    find_one(&conn, "id", &id)
}

pub fn find_by_username(pool: &DbPool, username: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    find_one(&conn, "username", &username)
}

pub fn find_by_email(pool: &DbPool, email: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    find_one(&conn, "email", &email)
}

/// Fail with a duplicate error if another user already holds `username` or `email`.
fn ensure_unique(
    conn: &Connection,
    username: &str,
    email: &str,
    exclude_id: Option<i64>,
) -> AppResult<()> {
    let taken_by_other =
        |user: Option<User>| user.is_some_and(|u| Some(u.id) != exclude_id);

    if taken_by_other(find_one(conn, "username", &username)?) {
        return Err(AppError::DuplicateUsername);
    }
    if taken_by_other(find_one(conn, "email", &email)?) {
        return Err(AppError::DuplicateEmail);
    }
    Ok(())
}

/// Map a UNIQUE constraint violation onto the matching duplicate error.
fn map_constraint(err: rusqlite::Error) -> AppError {
    if let rusqlite::Error::SqliteFailure(ref failure, Some(ref msg)) = err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation {
            if msg.contains("users.username") {
                return AppError::DuplicateUsername;
            }
            if msg.contains("users.email") {
                return AppError::DuplicateEmail;
            }
        }
    }
    AppError::Database(err)
}

pub fn create_user(
    pool: &DbPool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> AppResult<User> {
    let conn = pool.get()?;
    ensure_unique(&conn, username, email, None)?;

    conn.execute(
        "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
        params![username, email, password_hash],
    )
    .map_err(map_constraint)?;

    let id = conn.last_insert_rowid();
    find_one(&conn, "id", &id)?.ok_or(AppError::NotFound)
}

pub fn update_profile(
    pool: &DbPool,
    id: i64,
    username: &str,
    email: &str,
    image_file: &str,
) -> AppResult<User> {
    let conn = pool.get()?;
    ensure_unique(&conn, username, email, Some(id))?;

    let changed = conn
        .execute(
            "UPDATE users SET username = ?1, email = ?2, image_file = ?3 WHERE id = ?4",
            params![username, email, image_file, id],
        )
        .map_err(map_constraint)?;
    if changed == 0 {
        return Err(AppError::NotFound);
    }

    find_one(&conn, "id", &id)?.ok_or(AppError::NotFound)
}

pub fn update_password(pool: &DbPool, id: i64, password_hash: &str) -> AppResult<()> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, id],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DEFAULT_IMAGE;
    use crate::db::test_pool;

    #[test]
    fn create_user_assigns_default_image() {
        let pool = test_pool();
        let user = create_user(&pool, "alice", "alice@example.com", "hash").unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.image_file, DEFAULT_IMAGE);
        assert_eq!(find_by_id(&pool, user.id).unwrap(), Some(user));
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let pool = test_pool();
        create_user(&pool, "alice", "alice@example.com", "hash").unwrap();
        let err = create_user(&pool, "alice", "other@example.com", "hash").unwrap_err();
        assert!(matches!(err, AppError::DuplicateUsername));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let pool = test_pool();
        create_user(&pool, "alice", "alice@example.com", "hash").unwrap();
        let err = create_user(&pool, "bob", "alice@example.com", "hash").unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[test]
    fn lookups_are_case_sensitive() {
        let pool = test_pool();
        create_user(&pool, "alice", "alice@example.com", "hash").unwrap();
        assert!(find_by_username(&pool, "Alice").unwrap().is_none());
        assert!(find_by_email(&pool, "ALICE@example.com").unwrap().is_none());
        // Differently-cased names are distinct identities.
        create_user(&pool, "Alice", "ALICE@example.com", "hash").unwrap();
    }

    #[test]
    fn constraint_violation_maps_to_duplicate() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (username, email, password_hash) VALUES ('a', 'a@x.io', 'h')",
            [],
        )
        .unwrap();
        let err = conn
            .execute(
                "INSERT INTO users (username, email, password_hash) VALUES ('b', 'a@x.io', 'h')",
                [],
            )
            .unwrap_err();
        assert!(matches!(map_constraint(err), AppError::DuplicateEmail));
    }

    #[test]
    fn update_profile_allows_keeping_own_values() {
        let pool = test_pool();
        let user = create_user(&pool, "alice", "alice@example.com", "hash").unwrap();
        let updated =
            update_profile(&pool, user.id, "alice", "alice@example.com", "abc.png").unwrap();
        assert_eq!(updated.image_file, "abc.png");
    }

    #[test]
    fn update_profile_rejects_taken_values() {
        let pool = test_pool();
        let alice = create_user(&pool, "alice", "alice@example.com", "hash").unwrap();
        create_user(&pool, "bob", "bob@example.com", "hash").unwrap();

        let err = update_profile(&pool, alice.id, "bob", "alice@example.com", DEFAULT_IMAGE)
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateUsername));
        let err = update_profile(&pool, alice.id, "alice", "bob@example.com", DEFAULT_IMAGE)
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[test]
    fn update_password_overwrites_digest() {
        let pool = test_pool();
        let user = create_user(&pool, "alice", "alice@example.com", "old").unwrap();
        update_password(&pool, user.id, "new").unwrap();
        let reloaded = find_by_id(&pool, user.id).unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "new");
        assert!(matches!(
            update_password(&pool, 999, "x"),
            Err(AppError::NotFound)
        ));
    }
}
