use crate::models::db_operations::{timestamp_column, to_db_timestamp, DbError};
use crate::models::{SessionUser, User};
use bcrypt::{hash, verify};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, date_joined";

fn map_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        date_joined: timestamp_column(row, 5)?,
    })
}

pub fn create_user(
    conn: &Connection,
    username: &str,
    password: &str,
    email: &str,
    joined_at: DateTime<Utc>,
) -> Result<i64, DbError> {
    let hashed_password = hash(password, bcrypt::DEFAULT_COST)?;
    conn.execute(
        "INSERT INTO users (username, password_hash, email, date_joined) VALUES (?1, ?2, ?3, ?4)",
        params![username, hashed_password, email, to_db_timestamp(&joined_at)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn username_taken(conn: &Connection, username: &str) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )?)
}

pub fn read_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            [username],
            map_user,
        )
        .optional()?)
}

pub fn read_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<User>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            [user_id],
            map_user,
        )
        .optional()?)
}

pub fn update_profile(
    conn: &Connection,
    user_id: i64,
    username: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE users SET username = ?1, email = ?2, first_name = ?3, last_name = ?4 WHERE id = ?5",
        params![username, email, first_name, last_name, user_id],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("user {}", user_id)));
    }
    Ok(())
}

pub fn verify_credentials(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Option<SessionUser> {
    let res: rusqlite::Result<(i64, String)> = conn.query_row(
        "SELECT id, password_hash FROM users WHERE username = ?1",
        [username],
        |row| Ok((row.get(0)?, row.get(1)?)),
    );

    if let Ok((id, hash)) = res {
        if verify(password, &hash).unwrap_or(false) {
            return Some(SessionUser { id, username: username.to_string() });
        }
    }
    None
}
