use crate::models::db_operations::DbError;
use crate::DbPool;
use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use thiserror::Error;

/// Errors surfaced by request handlers. Hidden and missing content share
/// `NotFound` so a non-author cannot tell them apart.
#[derive(Error, Debug)]
pub enum BlogError {
    #[error("Not found")]
    NotFound,
    #[error("Forbidden")]
    Forbidden,
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
    #[error("Session error: {0}")]
    Session(String),
    #[error("CSRF token missing or invalid")]
    CsrfFailure,
    #[error("Media storage error: {0}")]
    Media(String),
}

/// User-facing explanation attached to an error response. The error page
/// renderer shows it below the heading.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl From<r2d2::Error> for BlogError {
    fn from(e: r2d2::Error) -> Self {
        BlogError::Database(DbError::Pool(e))
    }
}

impl From<rusqlite::Error> for BlogError {
    fn from(e: rusqlite::Error) -> Self {
        BlogError::Database(DbError::Rusqlite(e))
    }
}

impl ResponseError for BlogError {
    fn status_code(&self) -> StatusCode {
        match self {
            BlogError::NotFound => StatusCode::NOT_FOUND,
            BlogError::Forbidden | BlogError::CsrfFailure => StatusCode::FORBIDDEN,
            BlogError::Validation(_) => StatusCode::BAD_REQUEST,
            BlogError::Database(_) | BlogError::Template(_) | BlogError::Session(_) | BlogError::Media(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    // The body is filled in by `routes::pages::error_pages`.
    fn error_response(&self) -> HttpResponse {
        let detail = match self {
            BlogError::NotFound | BlogError::Forbidden => None,
            BlogError::Validation(msg) => Some(msg.clone()),
            BlogError::CsrfFailure => Some("CSRF verification failed. Reload the page and try again.".to_string()),
            other => {
                log::error!("Request failed: {}", other);
                None
            }
        };
        let mut res = HttpResponse::build(self.status_code()).finish();
        if let Some(msg) = detail {
            res.extensions_mut().insert(ErrorDetail(msg));
        }
        res
    }
}

// Helper to get a connection from the pool
pub fn get_conn(pool: &web::Data<DbPool>) -> Result<PooledConnection<SqliteConnectionManager>, BlogError> {
    Ok(pool.get()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_error_kind() {
        assert_eq!(BlogError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(BlogError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            BlogError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BlogError::Database(DbError::NotFound("x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(BlogError::CsrfFailure.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn error_responses_carry_a_detail_only_when_the_user_can_act_on_it() {
        let res = BlogError::Validation("Comment text is required.".into()).error_response();
        assert_eq!(
            res.extensions().get::<ErrorDetail>().map(|d| d.0.clone()),
            Some("Comment text is required.".to_string())
        );
        assert!(BlogError::CsrfFailure.error_response().extensions().get::<ErrorDetail>().is_some());

        let res = BlogError::Media("disk full".into()).error_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.extensions().get::<ErrorDetail>().is_none());
    }
}
