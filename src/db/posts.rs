//! Post store. Ownership checks belong to the caller.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::{Post, PostWithAuthor};
use crate::db::pagination::{Page, PER_PAGE};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

const JOINED_COLUMNS: &str = "p.id, p.title, p.content, p.date_posted, p.user_id, \
                              u.username, u.image_file";

fn joined_from_row(row: &Row<'_>) -> rusqlite::Result<PostWithAuthor> {
    Ok(PostWithAuthor {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        date_posted: row.get(3)?,
        user_id: row.get(4)?,
        author_username: row.get(5)?,
        author_image: row.get(6)?,
    })
}

pub fn create_post(pool: &DbPool, author_id: i64, title: &str, content: &str) -> AppResult<Post> {
    let conn = pool.get()?;
    let date_posted = Utc::now();
    conn.execute(
        "INSERT INTO posts (title, content, date_posted, user_id) VALUES (?1, ?2, ?3, ?4)",
        params![title, content, date_posted, author_id],
    )?;

    Ok(Post {
        id: conn.last_insert_rowid(),
        title: title.to_string(),
        content: content.to_string(),
        date_posted,
        user_id: author_id,
    })
}

pub fn find_post(pool: &DbPool, id: i64) -> AppResult<PostWithAuthor> {
    let conn = pool.get()?;
    let sql = format!(
        "SELECT {JOINED_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id WHERE p.id = ?1"
    );
    conn.query_row(&sql, params![id], joined_from_row)
        .optional()?
        .ok_or(AppError::NotFound)
}

pub fn update_post(pool: &DbPool, id: i64, title: &str, content: &str) -> AppResult<()> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE posts SET title = ?1, content = ?2 WHERE id = ?3",
        params![title, content, id],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub fn delete_post(pool: &DbPool, id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    let changed = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// All posts, newest first.
pub fn list_posts(pool: &DbPool, page: i64) -> AppResult<Page<PostWithAuthor>> {
    list(pool, None, page)
}

/// One author's posts, newest first.
pub fn list_posts_by_author(
    pool: &DbPool,
    author_id: i64,
    page: i64,
) -> AppResult<Page<PostWithAuthor>> {
    list(pool, Some(author_id), page)
}

fn list(pool: &DbPool, author_id: Option<i64>, page: i64) -> AppResult<Page<PostWithAuthor>> {
    let conn = pool.get()?;

    // `?1 IS NULL` lets the same statements serve the global and per-author listings.
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE ?1 IS NULL OR user_id = ?1",
        params![author_id],
        |row| row.get(0),
    )?;

    let Some(offset) = Page::<PostWithAuthor>::offset(page, PER_PAGE, total) else {
        return Ok(Page::new(Vec::new(), page, PER_PAGE, total));
    };

    let sql = format!(
        "SELECT {JOINED_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id \
         WHERE ?1 IS NULL OR p.user_id = ?1 \
         ORDER BY p.date_posted DESC, p.id DESC \
         LIMIT ?2 OFFSET ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params![author_id, PER_PAGE, offset], joined_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(items, page, PER_PAGE, total))
}
