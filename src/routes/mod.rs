use crate::helper::blog_helpers::BlogError;
use crate::models::Viewer;
use actix_csrf::extractor::CsrfToken;
use actix_web::HttpResponse;
use tera::{Context, Tera};

pub mod auth;
pub mod blog;
pub mod pages;

/// Context every page starts from: who is logged in, if anyone.
pub(crate) fn base_context(viewer: &Viewer) -> Context {
    let mut ctx = Context::new();
    ctx.insert("user", &viewer.session_user());
    ctx
}

/// `base_context` plus the CSRF token every form on the page posts back.
pub(crate) fn form_context(viewer: &Viewer, token: &CsrfToken) -> Context {
    let mut ctx = base_context(viewer);
    ctx.insert("csrf_token", token.get());
    ctx
}

pub(crate) fn render(tera: &Tera, template: &str, ctx: &Context) -> Result<HttpResponse, BlogError> {
    let rendered = tera.render(template, ctx)?;
    Ok(HttpResponse::Ok().content_type("text/html; charset=utf-8").body(rendered))
}

pub(crate) fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found().append_header(("location", location)).finish()
}
