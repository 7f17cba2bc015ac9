use crate::models::db_operations::{timestamp_column, to_db_timestamp, DbError};
use crate::models::{AuthorRef, Comment};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

const COMMENT_SELECT: &str = "SELECT cm.id, cm.post_id, u.id, u.username, cm.text, cm.created_at
    FROM comments cm
    JOIN users u ON u.id = cm.author_id";

fn map_comment(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author: AuthorRef { id: row.get(2)?, username: row.get(3)? },
        text: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

/// Oldest first.
pub fn read_comments_for_post(conn: &Connection, post_id: i64) -> Result<Vec<Comment>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE cm.post_id = ?1 ORDER BY cm.created_at ASC, cm.id ASC",
        COMMENT_SELECT
    ))?;
    let rows = stmt.query_map([post_id], map_comment)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Looks a comment up through its post. A comment that belongs to another
/// post is reported as missing.
pub fn find_comment_for_post(
    conn: &Connection,
    post_id: i64,
    comment_id: i64,
) -> Result<Option<Comment>, DbError> {
    Ok(conn
        .query_row(
            &format!("{} WHERE cm.id = ?1 AND cm.post_id = ?2", COMMENT_SELECT),
            params![comment_id, post_id],
            map_comment,
        )
        .optional()?)
}

pub fn create_comment(
    conn: &Connection,
    post_id: i64,
    author_id: i64,
    text: &str,
    created_at: DateTime<Utc>,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO comments (text, post_id, author_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![text, post_id, author_id, to_db_timestamp(&created_at)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_comment(conn: &Connection, comment_id: i64, text: &str) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE comments SET text = ?1 WHERE id = ?2",
        params![text, comment_id],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("comment {}", comment_id)));
    }
    Ok(())
}

pub fn delete_comment(conn: &Connection, comment_id: i64) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?)
}
