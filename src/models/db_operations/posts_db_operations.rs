use crate::models::db_operations::{timestamp_column, to_db_timestamp, DbError};
use crate::models::{AuthorRef, CategoryRef, LocationRef, Post, PostCard, PostFilter, PostInput};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

const POST_SELECT: &str = "SELECT p.id, p.title, p.text, p.pub_date, p.is_published, p.created_at,
        u.id, u.username,
        c.id, c.title, c.slug, c.is_published,
        l.id, l.name, l.is_published,
        p.image";

const POST_JOINS: &str = "FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id";

const COMMENT_COUNT: &str = "(SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count";

/// SQL form of `Post::is_live`. `{now}` is replaced by a positional parameter.
const LIVE_CONDITION: &str =
    "p.is_published = 1 AND p.pub_date <= {now} AND (p.category_id IS NULL OR c.is_published = 1)";

const FEED_ORDER: &str = "ORDER BY p.pub_date DESC, p.id DESC";

fn map_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    let category = match row.get::<_, Option<i64>>(8)? {
        Some(id) => Some(CategoryRef {
            id,
            title: row.get(9)?,
            slug: row.get(10)?,
            is_published: row.get(11)?,
        }),
        None => None,
    };
    let location = match row.get::<_, Option<i64>>(12)? {
        Some(id) => Some(LocationRef {
            id,
            name: row.get(13)?,
            is_published: row.get(14)?,
        }),
        None => None,
    };
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        pub_date: timestamp_column(row, 3)?,
        is_published: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
        author: AuthorRef { id: row.get(6)?, username: row.get(7)? },
        category,
        location,
        image: row.get(15)?,
    })
}

fn map_post_card(row: &rusqlite::Row) -> rusqlite::Result<PostCard> {
    Ok(PostCard {
        post: map_post(row)?,
        comment_count: row.get(16)?,
    })
}

/// Turns a filter into a WHERE clause plus its bound values, in order.
fn where_clause(filter: &PostFilter) -> (String, Vec<Value>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(now) = filter.live_at {
        values.push(Value::Text(to_db_timestamp(&now)));
        conditions.push(LIVE_CONDITION.replace("{now}", &format!("?{}", values.len())));
    }
    if let Some(category_id) = filter.category_id {
        values.push(Value::Integer(category_id));
        conditions.push(format!("p.category_id = ?{}", values.len()));
    }
    if let Some(author_id) = filter.author_id {
        values.push(Value::Integer(author_id));
        conditions.push(format!("p.author_id = ?{}", values.len()));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), values)
    }
}

/// Unfiltered lookup: returns the post whatever its publication state.
pub fn find_post_by_id(conn: &Connection, post_id: i64) -> Result<Option<Post>, DbError> {
    Ok(conn
        .query_row(
            &format!("{} {} WHERE p.id = ?1", POST_SELECT, POST_JOINS),
            [post_id],
            map_post,
        )
        .optional()?)
}

pub fn post_exists(conn: &Connection, post_id: i64) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        [post_id],
        |row| row.get(0),
    )?)
}

/// One page of feed rows, newest first, each with a freshly counted `comment_count`.
pub fn read_post_cards(
    conn: &Connection,
    filter: &PostFilter,
    limit: u32,
    offset: u32,
) -> Result<Vec<PostCard>, DbError> {
    let (where_sql, mut values) = where_clause(filter);
    values.push(Value::Integer(i64::from(limit)));
    let limit_idx = values.len();
    values.push(Value::Integer(i64::from(offset)));
    let offset_idx = values.len();

    let sql = format!(
        "{}, {} {} {} {} LIMIT ?{} OFFSET ?{}",
        POST_SELECT, COMMENT_COUNT, POST_JOINS, where_sql, FEED_ORDER, limit_idx, offset_idx
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), map_post_card)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn count_posts(conn: &Connection, filter: &PostFilter) -> Result<u64, DbError> {
    let (where_sql, values) = where_clause(filter);
    let sql = format!("SELECT COUNT(*) {} {}", POST_JOINS, where_sql);
    let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

pub fn create_post(
    conn: &Connection,
    author_id: i64,
    input: &PostInput,
    created_at: DateTime<Utc>,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO posts (title, text, pub_date, author_id, category_id, location_id, image, is_published, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)",
        params![
            input.title,
            input.text,
            to_db_timestamp(&input.pub_date),
            author_id,
            input.category_id,
            input.location_id,
            input.image,
            to_db_timestamp(&created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_post(conn: &Connection, post_id: i64, input: &PostInput) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE posts SET title = ?1, text = ?2, pub_date = ?3, category_id = ?4, location_id = ?5, image = ?6
         WHERE id = ?7",
        params![
            input.title,
            input.text,
            to_db_timestamp(&input.pub_date),
            input.category_id,
            input.location_id,
            input.image,
            post_id,
        ],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("post {}", post_id)));
    }
    Ok(())
}

/// Admin-side switch; authors cannot change it from the web forms.
pub fn set_post_published(conn: &Connection, post_id: i64, is_published: bool) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE posts SET is_published = ?1 WHERE id = ?2",
        params![is_published, post_id],
    )?)
}

/// Comments go with the post through the ON DELETE CASCADE foreign key.
pub fn delete_post(conn: &Connection, post_id: i64) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM posts WHERE id = ?1", [post_id])?)
}
