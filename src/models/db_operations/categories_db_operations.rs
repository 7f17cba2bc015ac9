use crate::models::db_operations::{timestamp_column, to_db_timestamp, DbError};
use crate::models::{Category, Location};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

const CATEGORY_COLUMNS: &str = "id, title, description, slug, is_published, created_at";

fn map_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        slug: row.get(3)?,
        is_published: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

fn map_location(row: &rusqlite::Row) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        name: row.get(1)?,
        is_published: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
    })
}

// --- Categories ---

pub fn create_category(
    conn: &Connection,
    title: &str,
    description: &str,
    slug: &str,
    is_published: bool,
    created_at: DateTime<Utc>,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO categories (title, description, slug, is_published, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![title, description, slug, is_published, to_db_timestamp(&created_at)],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Only published categories have a public page.
pub fn read_published_category_by_slug(conn: &Connection, slug: &str) -> Result<Option<Category>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM categories WHERE slug = ?1 AND is_published = 1", CATEGORY_COLUMNS),
            [slug],
            map_category,
        )
        .optional()?)
}

pub fn read_all_categories(conn: &Connection) -> Result<Vec<Category>, DbError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM categories ORDER BY title, id", CATEGORY_COLUMNS))?;
    let rows = stmt.query_map([], map_category)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn set_category_published(conn: &Connection, slug: &str, is_published: bool) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE categories SET is_published = ?1 WHERE slug = ?2",
        params![is_published, slug],
    )?)
}

pub fn category_exists(conn: &Connection, category_id: i64) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)",
        [category_id],
        |row| row.get(0),
    )?)
}

// --- Locations ---

pub fn create_location(
    conn: &Connection,
    name: &str,
    is_published: bool,
    created_at: DateTime<Utc>,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO locations (name, is_published, created_at) VALUES (?1, ?2, ?3)",
        params![name, is_published, to_db_timestamp(&created_at)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_locations(conn: &Connection) -> Result<Vec<Location>, DbError> {
    let mut stmt = conn.prepare("SELECT id, name, is_published, created_at FROM locations ORDER BY name, id")?;
    let rows = stmt.query_map([], map_location)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn location_exists(conn: &Connection, location_id: i64) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM locations WHERE id = ?1)",
        [location_id],
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup::setup_blog_db;

    #[test]
    fn hidden_category_has_no_public_lookup() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_blog_db(&mut conn).unwrap();
        let id = create_category(&conn, "Travel", "", "travel", true, Utc::now()).unwrap();

        let found = read_published_category_by_slug(&conn, "travel").unwrap().unwrap();
        assert_eq!(found.id, id);

        assert_eq!(set_category_published(&conn, "travel", false).unwrap(), 1);
        assert!(read_published_category_by_slug(&conn, "travel").unwrap().is_none());
        assert!(category_exists(&conn, id).unwrap());
        assert_eq!(read_all_categories(&conn).unwrap().len(), 1);
    }
}
