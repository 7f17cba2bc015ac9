use crate::helper::blog_helpers::{get_conn, BlogError};
use crate::helper::form_helpers::{self, ConfirmForm, RegistrationForm};
use crate::middleware::{self, RequestTime};
use crate::models::db_operations::users_db_operations;
use crate::models::Viewer;
use crate::routes::{form_context, redirect, render};
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfGuarded, CsrfToken};
use actix_session::Session;
use actix_web::{web, Error, HttpResponse};
use serde::Deserialize;
use tera::Tera;

#[derive(Deserialize)]
struct LoginForm {
    csrf_token: CsrfToken,
    username: String,
    password: String,
    #[serde(default)]
    next: String,
}

impl CsrfGuarded for LoginForm {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

#[derive(Deserialize)]
struct NextQuery {
    next: Option<String>,
}

// --- Route Configuration ---
pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/login/", web::get().to(show_login_form))
            .route("/login/", web::post().to(handle_login))
            .route("/logout/", web::post().to(handle_logout))
            .route("/registration/", web::get().to(show_registration_form))
            .route("/registration/", web::post().to(handle_registration)),
    );
}

fn render_login(
    tera: &Tera,
    viewer: &Viewer,
    token: &CsrfToken,
    next: &str,
    error: Option<&str>,
) -> Result<HttpResponse, BlogError> {
    let mut ctx = form_context(viewer, token);
    ctx.insert("next", next);
    ctx.insert("error", &error);
    render(tera, "registration/login.html", &ctx)
}

async fn show_login_form(
    viewer: Viewer,
    query: web::Query<NextQuery>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let next = middleware::safe_next(query.next.as_deref());
    if viewer.session_user().is_some() {
        return Ok(redirect(&next));
    }
    render_login(&tera, &viewer, &token, &next, None)
}

async fn handle_login(
    session: Session,
    form: Result<Csrf<web::Form<LoginForm>>, Error>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, BlogError> {
    let form = middleware::verified(form)?.into_inner();
    let next = middleware::safe_next(Some(form.next.as_str()).filter(|n| !n.is_empty()));
    let conn = get_conn(&pool)?;
    match users_db_operations::verify_credentials(&conn, form.username.trim(), &form.password) {
        Some(user) => {
            middleware::log_in(&session, &user).map_err(|e| BlogError::Session(e.to_string()))?;
            log::info!("User '{}' logged in", user.username);
            Ok(redirect(&next))
        }
        None => {
            log::warn!("Failed login attempt for username '{}'", form.username.trim());
            render_login(
                &tera,
                &Viewer::Anonymous,
                &form.csrf_token,
                &next,
                Some("Please enter a correct username and password."),
            )
        }
    }
}

async fn handle_logout(
    session: Session,
    form: Result<Csrf<web::Form<ConfirmForm>>, Error>,
) -> Result<HttpResponse, BlogError> {
    middleware::verified(form)?;
    middleware::log_out(&session);
    Ok(redirect("/"))
}

fn render_registration(
    tera: &Tera,
    viewer: &Viewer,
    token: &CsrfToken,
    username: &str,
    error: Option<&str>,
) -> Result<HttpResponse, BlogError> {
    let mut ctx = form_context(viewer, token);
    ctx.insert("username", username);
    ctx.insert("error", &error);
    render(tera, "registration/registration_form.html", &ctx)
}

async fn show_registration_form(
    viewer: Viewer,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    render_registration(&tera, &viewer, &token, "", None)
}

async fn handle_registration(
    viewer: Viewer,
    now: RequestTime,
    form: Result<Csrf<web::Form<RegistrationForm>>, Error>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, BlogError> {
    let form = middleware::verified(form)?.into_inner();
    let conn = get_conn(&pool)?;
    let checked = form_helpers::validate_username(&form.username).and_then(|username| {
        form_helpers::validate_password(&form.password1, &form.password2)?;
        if users_db_operations::username_taken(&conn, &username)? {
            return Err(BlogError::Validation("A user with that username already exists.".to_string()));
        }
        Ok(username)
    });
    let username = match checked {
        Ok(username) => username,
        Err(BlogError::Validation(msg)) => {
            return render_registration(&tera, &viewer, &form.csrf_token, form.username.trim(), Some(&msg));
        }
        Err(e) => return Err(e),
    };

    let user_id = users_db_operations::create_user(&conn, &username, &form.password1, "", now.0)?;
    log::info!("Registered user '{}' with id {}", username, user_id);
    Ok(redirect("/"))
}
