use crate::helper::blog_helpers::BlogError;
use crate::helper::sanitization_helpers;
use crate::models::db_operations::categories_db_operations;
use crate::models::PostInput;
use actix_csrf::extractor::{CsrfGuarded, CsrfToken};
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

const MAX_TITLE_LEN: usize = 256;
const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;
const MIN_PUB_YEAR: i32 = 1;
const MAX_PUB_YEAR: i32 = 9999;

/// Also used to refill the form when it is shown again.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct PostForm {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub pub_date: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
}

/// Body of the delete and logout buttons: nothing but the token.
#[derive(Deserialize)]
pub struct ConfirmForm {
    csrf_token: CsrfToken,
}

impl CsrfGuarded for ConfirmForm {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

#[derive(Deserialize)]
pub struct CommentForm {
    pub csrf_token: CsrfToken,
    pub text: String,
}

impl CsrfGuarded for CommentForm {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

#[derive(Deserialize)]
pub struct ProfileForm {
    pub csrf_token: CsrfToken,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl CsrfGuarded for ProfileForm {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

#[derive(Deserialize)]
pub struct RegistrationForm {
    pub csrf_token: CsrfToken,
    pub username: String,
    pub password1: String,
    pub password2: String,
}

impl CsrfGuarded for RegistrationForm {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

fn invalid(msg: &str) -> BlogError {
    BlogError::Validation(msg.to_string())
}

/// Accepts the `datetime-local` input format (with or without seconds) as
/// UTC, or a full RFC 3339 value. An empty field means "publish now".
///
/// Years are limited to four digits: stored timestamps are compared as text,
/// which only orders correctly while they all have the same width.
pub fn parse_pub_date(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, BlogError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(now);
    }
    let parsed = match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| invalid("Publication date must look like 2024-01-31T18:30."))?,
    };
    if !(MIN_PUB_YEAR..=MAX_PUB_YEAR).contains(&parsed.year()) {
        return Err(invalid("Publication year must be between 1 and 9999."));
    }
    Ok(parsed)
}

fn parse_optional_id(raw: &str, what: &str) -> Result<Option<i64>, BlogError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| BlogError::Validation(format!("Unknown {}.", what)))
}

/// Checks a submitted post form and turns it into storable input.
pub fn validate_post_form(conn: &Connection, form: &PostForm, now: DateTime<Utc>) -> Result<PostInput, BlogError> {
    let title = sanitization_helpers::strip_all_html(form.title.trim());
    let text = form.text.trim().to_string();
    if title.is_empty() || text.is_empty() {
        return Err(invalid("Title and text are required."));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(invalid("Title is too long."));
    }

    let pub_date = parse_pub_date(&form.pub_date, now)?;

    let category_id = parse_optional_id(&form.category, "category")?;
    if let Some(id) = category_id {
        if !categories_db_operations::category_exists(conn, id)? {
            return Err(invalid("Unknown category."));
        }
    }
    let location_id = parse_optional_id(&form.location, "location")?;
    if let Some(id) = location_id {
        if !categories_db_operations::location_exists(conn, id)? {
            return Err(invalid("Unknown location."));
        }
    }

    Ok(PostInput { title, text, pub_date, category_id, location_id, image: None })
}

pub fn validate_comment_text(raw: &str) -> Result<String, BlogError> {
    let text = sanitization_helpers::strip_all_html(raw.trim());
    if text.is_empty() {
        return Err(invalid("Comment text is required."));
    }
    Ok(text)
}

/// Letters, digits and `@.+-_`, at most 150 characters.
pub fn validate_username(raw: &str) -> Result<String, BlogError> {
    let username = raw.trim();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(invalid("Username must be between 1 and 150 characters."));
    }
    if !username.chars().all(|c| c.is_alphanumeric() || "@.+-_".contains(c)) {
        return Err(invalid("Username may only contain letters, digits and @/./+/-/_ characters."));
    }
    Ok(username.to_string())
}

pub fn validate_password(password1: &str, password2: &str) -> Result<(), BlogError> {
    if password1 != password2 {
        return Err(invalid("The two password fields didn't match."));
    }
    if password1.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid("Password must be at least 8 characters long."));
    }
    Ok(())
}
