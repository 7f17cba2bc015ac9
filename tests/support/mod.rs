#![allow(dead_code)]

use blogicum_backend::models::db_operations::{categories_db_operations, posts_db_operations, to_db_timestamp};
use blogicum_backend::models::{PostInput, SessionUser, Viewer};
use blogicum_backend::setup::db_setup::setup_blog_db;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{params, Connection};

/// The instant every fixture is judged against.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn memory_db() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    setup_blog_db(&mut conn).unwrap();
    conn
}

/// Inserts a user without paying for bcrypt.
pub fn add_user(conn: &Connection, username: &str) -> SessionUser {
    conn.execute(
        "INSERT INTO users (username, password_hash, date_joined) VALUES (?1, 'x', ?2)",
        params![username, to_db_timestamp(&now())],
    )
    .unwrap();
    SessionUser { id: conn.last_insert_rowid(), username: username.to_string() }
}

pub fn viewer(user: &SessionUser) -> Viewer {
    Viewer::User(user.clone())
}

pub fn add_category(conn: &Connection, slug: &str, is_published: bool) -> i64 {
    categories_db_operations::create_category(conn, slug, "", slug, is_published, now()).unwrap()
}

pub struct PostSpec {
    pub title: &'static str,
    pub offset: Duration,
    pub is_published: bool,
    pub category_id: Option<i64>,
}

impl PostSpec {
    /// Published, dated `hours` before `now()`, no category.
    pub fn live(title: &'static str, hours: i64) -> Self {
        PostSpec { title, offset: Duration::hours(-hours), is_published: true, category_id: None }
    }

    pub fn scheduled(title: &'static str, hours: i64) -> Self {
        PostSpec { title, offset: Duration::hours(hours), is_published: true, category_id: None }
    }

    pub fn draft(title: &'static str) -> Self {
        PostSpec { is_published: false, ..PostSpec::live(title, 1) }
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

pub fn add_post(conn: &Connection, author: &SessionUser, spec: PostSpec) -> i64 {
    let input = PostInput {
        title: spec.title.to_string(),
        text: format!("Body of {}", spec.title),
        pub_date: now() + spec.offset,
        category_id: spec.category_id,
        location_id: None,
        image: None,
    };
    let id = posts_db_operations::create_post(conn, author.id, &input, now()).unwrap();
    if !spec.is_published {
        posts_db_operations::set_post_published(conn, id, false).unwrap();
    }
    id
}
