use crate::helper::blog_helpers::{BlogError, ErrorDetail};
use crate::middleware;
use crate::routes::base_context;
use actix_web::{
    dev::ServiceResponse,
    http::{
        header::{self, HeaderValue},
        StatusCode,
    },
    middleware::{ErrorHandlerResponse, ErrorHandlers},
    web, HttpResponse, ResponseError,
};
use tera::Tera;

/// Fallback for every unknown URL.
pub async fn not_found() -> HttpResponse {
    BlogError::NotFound.error_response()
}

/// Renders the site's own page for every error status a handler can
/// produce, whichever way the response was built.
pub fn error_pages<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new()
        .handler(StatusCode::BAD_REQUEST, |res| error_page(res, "pages/400.html"))
        .handler(StatusCode::FORBIDDEN, |res| error_page(res, "pages/403.html"))
        .handler(StatusCode::NOT_FOUND, |res| error_page(res, "pages/404.html"))
        .handler(StatusCode::INTERNAL_SERVER_ERROR, |res| error_page(res, "pages/500.html"))
}

fn error_page<B>(res: ServiceResponse<B>, template: &str) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let Some(tera) = res.request().app_data::<web::Data<Tera>>().cloned() else {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    };

    let mut ctx = base_context(&middleware::viewer_of(res.request()));
    if let Some(detail) = res.response().extensions().get::<ErrorDetail>() {
        ctx.insert("message", &detail.0);
    }
    let rendered = match tera.render(template, &ctx) {
        Ok(rendered) => rendered,
        Err(err) => {
            log::error!("Template rendering error for {}: {}", template, err);
            return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
        }
    };

    let (req, res) = res.into_parts();
    let mut res = res.set_body(rendered);
    res.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    let res = ServiceResponse::new(req, res).map_into_boxed_body().map_into_right_body();
    Ok(ErrorHandlerResponse::Response(res))
}
