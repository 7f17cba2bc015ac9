use actix_csrf::extractor::Csrf;
use actix_csrf::CsrfMiddleware;
use actix_web::{
    body::EitherBody,
    dev::{self, forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    Error, FromRequest, HttpRequest, HttpResponse,
};
use actix_session::{Session, SessionExt, SessionInsertError};
use rand::rngs::StdRng;
use chrono::{DateTime, Utc};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use std::future::{ready, Ready as StdReady};
use url::form_urlencoded;

use crate::helper::blog_helpers::BlogError;
use crate::models::{SessionUser, Viewer};

const SESSION_USER_ID: &str = "user_id";
const SESSION_USERNAME: &str = "username";

fn session_user(session: &Session) -> Option<SessionUser> {
    match (session.get::<i64>(SESSION_USER_ID), session.get::<String>(SESSION_USERNAME)) {
        (Ok(Some(id)), Ok(Some(username))) => Some(SessionUser { id, username }),
        _ => None,
    }
}

pub fn log_in(session: &Session, user: &SessionUser) -> Result<(), SessionInsertError> {
    session.renew();
    session.insert(SESSION_USER_ID, user.id)?;
    session.insert(SESSION_USERNAME, &user.username)?;
    Ok(())
}

pub fn log_out(session: &Session) {
    session.purge();
}

/// Reads the viewer straight from the session, for code that runs outside
/// an extractor.
pub fn viewer_of(req: &HttpRequest) -> Viewer {
    match session_user(&req.get_session()) {
        Some(user) => Viewer::User(user),
        None => Viewer::Anonymous,
    }
}

/// Every page that renders a form. A GET to one of these patterns hands out
/// a fresh CSRF cookie; the navigation bar's logout form puts every page
/// with a logged-in user on this list.
const FORM_PAGES: &[&str] = &[
    "/",
    "/category/{category_slug}/",
    "/profile/{username}/",
    "/edit_profile/",
    "/posts/create/",
    "/posts/{post_id}/",
    "/posts/{post_id}/edit/",
    "/posts/{post_id}/delete/",
    "/posts/{post_id}/edit_comment/{comment_id}/",
    "/posts/{post_id}/delete_comment/{comment_id}/",
    "/auth/login/",
    "/auth/registration/",
];

pub fn csrf_protection() -> CsrfMiddleware<StdRng> {
    FORM_PAGES
        .iter()
        .fold(CsrfMiddleware::<StdRng>::new(), |csrf, pattern| csrf.set_cookie(Method::GET, *pattern))
}

/// Unwraps a CSRF-checked extractor. A missing or mismatched token is a 403.
pub fn verified<T>(guarded: Result<Csrf<T>, Error>) -> Result<T, BlogError> {
    match guarded {
        Ok(csrf) => Ok(csrf.into_inner()),
        Err(err) => {
            log::warn!("Rejected a form submission: {}", err);
            Err(BlogError::CsrfFailure)
        }
    }
}

/// `/auth/login/?next=...` for the page the viewer was trying to reach.
pub fn login_url(next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("/auth/login/?next={}", encoded)
}

/// Only same-site paths are accepted as a post-login destination.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path.to_string(),
        _ => "/".to_string(),
    }
}

/// The current viewer. Never fails: no session means anonymous.
impl FromRequest for Viewer {
    type Error = actix_web::Error;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(Ok(viewer_of(req)))
    }
}

/// A logged-in user. Routes using it sit behind `LoginRequired`.
impl FromRequest for SessionUser {
    type Error = actix_web::Error;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        match session_user(&req.get_session()) {
            Some(user) => ready(Ok(user)),
            None => ready(Err(actix_web::error::ErrorUnauthorized("Not logged in."))),
        }
    }
}

/// The instant a request is judged against, read once when the handler
/// starts.
#[derive(Debug, Clone, Copy)]
pub struct RequestTime(pub DateTime<Utc>);

impl FromRequest for RequestTime {
    type Error = actix_web::Error;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(_: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(Ok(RequestTime(Utc::now())))
    }
}

/// Sends anonymous visitors to the login page, remembering where they were
/// going.
pub struct LoginRequired;

impl<S, B> Transform<S, ServiceRequest> for LoginRequired
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = LoginRequiredMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(LoginRequiredMiddleware { service })
    }
}

pub struct LoginRequiredMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for LoginRequiredMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if session_user(&req.get_session()).is_some() {
            let fut = self.service.call(req);
            Box::pin(async move {
                let res = fut.await?;
                Ok(res.map_into_left_body())
            })
        } else {
            let location = login_url(req.path());
            Box::pin(async move {
                let (http_req, _payload) = req.into_parts();
                let res = HttpResponse::Found()
                    .append_header(("location", location))
                    .finish()
                    .map_into_right_body();
                Ok(ServiceResponse::new(http_req, res))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_encodes_next() {
        assert_eq!(login_url("/posts/3/edit/"), "/auth/login/?next=%2Fposts%2F3%2Fedit%2F");
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/profile/anna/")), "/profile/anna/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }
}
