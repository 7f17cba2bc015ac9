use crate::config::Config;
use crate::helper::blog_helpers::{get_conn, BlogError};
use crate::helper::form_helpers::{self, CommentForm, ConfirmForm, PostForm, ProfileForm};
use crate::helper::media_helpers::{self, PostSubmission};
use crate::helper::ownership_helpers::{self, DenialPolicy, Owned, WriteDecision};
use crate::helper::sanitization_helpers;
use crate::helper::visibility_helpers::{self, FeedContext};
use crate::middleware::{self, LoginRequired, RequestTime};
use crate::models::db_operations::{categories_db_operations, comments_db_operations, posts_db_operations, users_db_operations};
use crate::models::{Post, PostInput, SessionUser, Viewer};
use crate::routes::{form_context, redirect, render};
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfToken};
use actix_session::Session;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use rusqlite::Connection;
use serde::Deserialize;
use tera::{Context, Tera};

#[derive(Deserialize)]
pub struct PageQuery {
    page: Option<String>,
}

// --- Route Configuration ---
pub fn config_blog(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        // Registered before /posts/{post_id}/ so "create" is never read as an id.
        .service(
            web::resource("/posts/create/")
                .wrap(LoginRequired)
                .route(web::get().to(show_create_post))
                .route(web::post().to(create_post_action)),
        )
        .route("/posts/{post_id}/", web::get().to(post_detail))
        .service(
            web::resource("/posts/{post_id}/edit/")
                .route(web::get().to(show_edit_post))
                .route(web::post().to(edit_post_action)),
        )
        .service(
            web::resource("/posts/{post_id}/delete/")
                .route(web::get().to(show_delete_post))
                .route(web::post().to(delete_post_action)),
        )
        .service(
            web::resource("/posts/{post_id}/add_comment/")
                .wrap(LoginRequired)
                .route(web::post().to(add_comment_action)),
        )
        .service(
            web::resource("/posts/{post_id}/edit_comment/{comment_id}/")
                .route(web::get().to(show_edit_comment))
                .route(web::post().to(edit_comment_action)),
        )
        .service(
            web::resource("/posts/{post_id}/delete_comment/{comment_id}/")
                .route(web::get().to(show_delete_comment))
                .route(web::post().to(delete_comment_action)),
        )
        .route("/category/{category_slug}/", web::get().to(category_posts))
        .route("/profile/{username}/", web::get().to(profile))
        .service(
            web::resource("/edit_profile/")
                .wrap(LoginRequired)
                .route(web::get().to(show_edit_profile))
                .route(web::post().to(edit_profile_action)),
        );
}

fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

/// Runs the ownership guard for a write request whose target was found.
/// `Err(response)` is the redirect to send instead of doing the write.
fn write_gate<R: Owned>(
    req: &HttpRequest,
    viewer: &Viewer,
    resource: &R,
    config: &Config,
) -> Result<Result<SessionUser, HttpResponse>, BlogError> {
    let decision = ownership_helpers::guard_write(viewer, resource, DenialPolicy::from(config))?;
    Ok(match decision {
        WriteDecision::Proceed(user) => Ok(user),
        WriteDecision::RedirectToLogin => Err(redirect(&middleware::login_url(req.path()))),
        WriteDecision::RedirectToPost(url) => Err(redirect(&url)),
    })
}

fn form_from_post(post: &Post) -> PostForm {
    PostForm {
        title: post.title.clone(),
        text: post.text.clone(),
        pub_date: post.pub_date.format("%Y-%m-%dT%H:%M").to_string(),
        category: post.category.as_ref().map(|c| c.id.to_string()).unwrap_or_default(),
        location: post.location.as_ref().map(|l| l.id.to_string()).unwrap_or_default(),
    }
}

fn render_post_form(
    tera: &Tera,
    conn: &Connection,
    mut ctx: Context,
    form: &PostForm,
    error: Option<&str>,
) -> Result<HttpResponse, BlogError> {
    ctx.insert("form", form);
    ctx.insert("categories", &categories_db_operations::read_all_categories(conn)?);
    ctx.insert("locations", &categories_db_operations::read_all_locations(conn)?);
    ctx.insert("error", &error);
    render(tera, "blog/create.html", &ctx)
}

/// Form checks plus whatever went wrong while reading the upload.
fn validate_submission(conn: &Connection, submission: &PostSubmission, now: RequestTime) -> Result<PostInput, BlogError> {
    let input = form_helpers::validate_post_form(conn, &submission.form, now.0)?;
    match &submission.image_error {
        Some(msg) => Err(BlogError::Validation(msg.clone())),
        None => Ok(input),
    }
}

// --- Feeds ---

async fn index(
    viewer: Viewer,
    now: RequestTime,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let page_number = visibility_helpers::parse_page_number(query.page.as_deref())?;
    let conn = get_conn(&pool)?;
    let feed = visibility_helpers::visible_posts(&conn, &viewer, FeedContext::Global, now.0, page_number)?;

    let mut ctx = form_context(&viewer, &token);
    ctx.insert("page_obj", &feed.page);
    render(&tera, "blog/index.html", &ctx)
}

async fn category_posts(
    viewer: Viewer,
    now: RequestTime,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let page_number = visibility_helpers::parse_page_number(query.page.as_deref())?;
    let conn = get_conn(&pool)?;
    let feed = visibility_helpers::visible_posts(&conn, &viewer, FeedContext::Category(&slug), now.0, page_number)?;

    let mut ctx = form_context(&viewer, &token);
    ctx.insert("category", &feed.category);
    ctx.insert("page_obj", &feed.page);
    render(&tera, "blog/category.html", &ctx)
}

async fn profile(
    viewer: Viewer,
    now: RequestTime,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let page_number = visibility_helpers::parse_page_number(query.page.as_deref())?;
    let conn = get_conn(&pool)?;
    let feed = visibility_helpers::visible_posts(&conn, &viewer, FeedContext::Profile(&username), now.0, page_number)?;

    let is_owner = feed.profile.as_ref().map_or(false, |p| viewer.is_user(p.id));
    let mut ctx = form_context(&viewer, &token);
    ctx.insert("profile", &feed.profile);
    ctx.insert("is_owner", &is_owner);
    ctx.insert("page_obj", &feed.page);
    render(&tera, "blog/profile.html", &ctx)
}

// --- Single post ---

async fn post_detail(
    viewer: Viewer,
    now: RequestTime,
    post_id: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let conn = get_conn(&pool)?;
    let (post, comments) = visibility_helpers::post_detail(&conn, &viewer, *post_id, now.0)?;

    let mut ctx = form_context(&viewer, &token);
    ctx.insert("body_html", &sanitization_helpers::render_markdown(&post.text));
    ctx.insert("is_author", &viewer.is_user(post.author.id));
    ctx.insert("post", &post);
    ctx.insert("comments", &comments);
    render(&tera, "blog/detail.html", &ctx)
}

// --- Post writes ---

async fn show_create_post(
    user: SessionUser,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let conn = get_conn(&pool)?;
    let ctx = form_context(&Viewer::User(user), &token);
    render_post_form(&tera, &conn, ctx, &PostForm::default(), None)
}

async fn create_post_action(
    user: SessionUser,
    now: RequestTime,
    submission: Result<Csrf<PostSubmission>, Error>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> Result<HttpResponse, BlogError> {
    let submission = middleware::verified(submission)?;
    let conn = get_conn(&pool)?;
    let mut input = match validate_submission(&conn, &submission, now) {
        Ok(input) => input,
        Err(BlogError::Validation(msg)) => {
            let ctx = form_context(&Viewer::User(user), &submission.csrf_token);
            return render_post_form(&tera, &conn, ctx, &submission.form, Some(&msg));
        }
        Err(e) => return Err(e),
    };

    if let Some(image) = submission.image {
        input.image = Some(media_helpers::save_post_image(&config.media_path, image).await?);
    }
    let post_id = posts_db_operations::create_post(&conn, user.id, &input, now.0)?;
    log::info!("User '{}' created post {}", user.username, post_id);
    Ok(redirect(&profile_url(&user.username)))
}

async fn show_edit_post(
    req: HttpRequest,
    viewer: Viewer,
    post_id: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let conn = get_conn(&pool)?;
    let post = ownership_helpers::load_post_for_write(&conn, *post_id)?;
    if let Err(response) = write_gate(&req, &viewer, &post, &config)? {
        return Ok(response);
    }

    let mut ctx = form_context(&viewer, &token);
    ctx.insert("post", &post);
    render_post_form(&tera, &conn, ctx, &form_from_post(&post), None)
}

async fn edit_post_action(
    req: HttpRequest,
    viewer: Viewer,
    now: RequestTime,
    post_id: web::Path<i64>,
    submission: Result<Csrf<PostSubmission>, Error>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> Result<HttpResponse, BlogError> {
    let submission = middleware::verified(submission)?;
    let conn = get_conn(&pool)?;
    let post = ownership_helpers::load_post_for_write(&conn, *post_id)?;
    let user = match write_gate(&req, &viewer, &post, &config)? {
        Ok(user) => user,
        Err(response) => return Ok(response),
    };

    let mut input = match validate_submission(&conn, &submission, now) {
        Ok(input) => input,
        Err(BlogError::Validation(msg)) => {
            let mut ctx = form_context(&viewer, &submission.csrf_token);
            ctx.insert("post", &post);
            return render_post_form(&tera, &conn, ctx, &submission.form, Some(&msg));
        }
        Err(e) => return Err(e),
    };

    // A new upload replaces the old image; otherwise it stays unless cleared.
    input.image = match (submission.image, submission.clear_image) {
        (Some(image), _) => Some(media_helpers::save_post_image(&config.media_path, image).await?),
        (None, true) => None,
        (None, false) => post.image.clone(),
    };
    posts_db_operations::update_post(&conn, post.id, &input)?;
    if let Some(old) = post.image.as_deref().filter(|old| input.image.as_deref() != Some(*old)) {
        media_helpers::remove_post_image(&config.media_path, old).await;
    }
    log::info!("User '{}' edited post {}", user.username, post.id);
    Ok(redirect(&ownership_helpers::post_detail_url(post.id)))
}

async fn show_delete_post(
    req: HttpRequest,
    viewer: Viewer,
    post_id: web::Path<i64>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let conn = get_conn(&pool)?;
    let post = ownership_helpers::load_post_for_write(&conn, *post_id)?;
    if let Err(response) = write_gate(&req, &viewer, &post, &config)? {
        return Ok(response);
    }

    let mut ctx = form_context(&viewer, &token);
    ctx.insert("post", &post);
    ctx.insert("deleting", &true);
    ctx.insert("form", &form_from_post(&post));
    render(&tera, "blog/create.html", &ctx)
}

async fn delete_post_action(
    req: HttpRequest,
    viewer: Viewer,
    post_id: web::Path<i64>,
    form: Result<Csrf<web::Form<ConfirmForm>>, Error>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, BlogError> {
    middleware::verified(form)?;
    let conn = get_conn(&pool)?;
    let post = ownership_helpers::load_post_for_write(&conn, *post_id)?;
    let user = match write_gate(&req, &viewer, &post, &config)? {
        Ok(user) => user,
        Err(response) => return Ok(response),
    };

    posts_db_operations::delete_post(&conn, post.id)?;
    if let Some(image) = &post.image {
        media_helpers::remove_post_image(&config.media_path, image).await;
    }
    log::info!("User '{}' deleted post {}", user.username, post.id);
    Ok(redirect("/"))
}

// --- Comment writes ---

async fn add_comment_action(
    user: SessionUser,
    now: RequestTime,
    post_id: web::Path<i64>,
    form: Result<Csrf<web::Form<CommentForm>>, Error>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, BlogError> {
    let form = middleware::verified(form)?.into_inner();
    let conn = get_conn(&pool)?;
    let viewer = Viewer::User(user.clone());
    // Commenting needs the same visibility as reading.
    let post = visibility_helpers::fetch_post_for_viewer(&conn, &viewer, *post_id, now.0)?;

    let text = match form_helpers::validate_comment_text(&form.text) {
        Ok(text) => text,
        Err(BlogError::Validation(msg)) => {
            let mut ctx = form_context(&viewer, &form.csrf_token);
            ctx.insert("post", &post);
            ctx.insert("text", &form.text);
            ctx.insert("error", &Some(msg));
            return render(&tera, "blog/comment.html", &ctx);
        }
        Err(e) => return Err(e),
    };
    let comment_id = comments_db_operations::create_comment(&conn, post.id, user.id, &text, now.0)?;
    log::info!("User '{}' added comment {} to post {}", user.username, comment_id, post.id);
    Ok(redirect(&ownership_helpers::post_detail_url(post.id)))
}

async fn show_edit_comment(
    req: HttpRequest,
    viewer: Viewer,
    path: web::Path<(i64, i64)>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let (post_id, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let comment = ownership_helpers::load_comment_for_write(&conn, post_id, comment_id)?;
    if let Err(response) = write_gate(&req, &viewer, &comment, &config)? {
        return Ok(response);
    }

    let mut ctx = form_context(&viewer, &token);
    ctx.insert("comment", &comment);
    ctx.insert("error", &None::<String>);
    render(&tera, "blog/comment.html", &ctx)
}

async fn edit_comment_action(
    req: HttpRequest,
    viewer: Viewer,
    path: web::Path<(i64, i64)>,
    form: Result<Csrf<web::Form<CommentForm>>, Error>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> Result<HttpResponse, BlogError> {
    let form = middleware::verified(form)?.into_inner();
    let (post_id, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let comment = ownership_helpers::load_comment_for_write(&conn, post_id, comment_id)?;
    let user = match write_gate(&req, &viewer, &comment, &config)? {
        Ok(user) => user,
        Err(response) => return Ok(response),
    };

    let text = match form_helpers::validate_comment_text(&form.text) {
        Ok(text) => text,
        Err(BlogError::Validation(msg)) => {
            let mut ctx = form_context(&viewer, &form.csrf_token);
            ctx.insert("comment", &comment);
            ctx.insert("error", &Some(msg));
            return render(&tera, "blog/comment.html", &ctx);
        }
        Err(e) => return Err(e),
    };
    comments_db_operations::update_comment(&conn, comment.id, &text)?;
    log::info!("User '{}' edited comment {}", user.username, comment.id);
    Ok(redirect(&ownership_helpers::post_detail_url(post_id)))
}

async fn show_delete_comment(
    req: HttpRequest,
    viewer: Viewer,
    path: web::Path<(i64, i64)>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let (post_id, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let comment = ownership_helpers::load_comment_for_write(&conn, post_id, comment_id)?;
    if let Err(response) = write_gate(&req, &viewer, &comment, &config)? {
        return Ok(response);
    }

    let mut ctx = form_context(&viewer, &token);
    ctx.insert("comment", &comment);
    ctx.insert("deleting", &true);
    ctx.insert("error", &None::<String>);
    render(&tera, "blog/comment.html", &ctx)
}

async fn delete_comment_action(
    req: HttpRequest,
    viewer: Viewer,
    path: web::Path<(i64, i64)>,
    form: Result<Csrf<web::Form<ConfirmForm>>, Error>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, BlogError> {
    middleware::verified(form)?;
    let (post_id, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let comment = ownership_helpers::load_comment_for_write(&conn, post_id, comment_id)?;
    let user = match write_gate(&req, &viewer, &comment, &config)? {
        Ok(user) => user,
        Err(response) => return Ok(response),
    };

    comments_db_operations::delete_comment(&conn, comment.id)?;
    log::info!("User '{}' deleted comment {}", user.username, comment.id);
    Ok(redirect(&ownership_helpers::post_detail_url(post_id)))
}

// --- Profile ---

async fn show_edit_profile(
    user: SessionUser,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, BlogError> {
    let conn = get_conn(&pool)?;
    let details = users_db_operations::read_user_by_id(&conn, user.id)?.ok_or(BlogError::NotFound)?;

    let mut ctx = form_context(&Viewer::User(user), &token);
    ctx.insert("profile", &details);
    ctx.insert("error", &None::<String>);
    render(&tera, "blog/user.html", &ctx)
}

async fn edit_profile_action(
    user: SessionUser,
    session: Session,
    form: Result<Csrf<web::Form<ProfileForm>>, Error>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, BlogError> {
    let form = middleware::verified(form)?.into_inner();
    let conn = get_conn(&pool)?;
    let details = users_db_operations::read_user_by_id(&conn, user.id)?.ok_or(BlogError::NotFound)?;

    let checked = form_helpers::validate_username(&form.username).and_then(|username| {
        if username != details.username && users_db_operations::username_taken(&conn, &username)? {
            return Err(BlogError::Validation("A user with that username already exists.".to_string()));
        }
        Ok(username)
    });
    let username = match checked {
        Ok(username) => username,
        Err(BlogError::Validation(msg)) => {
            let mut ctx = form_context(&Viewer::User(user), &form.csrf_token);
            ctx.insert("profile", &details);
            ctx.insert("error", &Some(msg));
            return render(&tera, "blog/user.html", &ctx);
        }
        Err(e) => return Err(e),
    };

    users_db_operations::update_profile(
        &conn,
        user.id,
        &username,
        &sanitization_helpers::strip_all_html(form.email.trim()),
        &sanitization_helpers::strip_all_html(form.first_name.trim()),
        &sanitization_helpers::strip_all_html(form.last_name.trim()),
    )?;
    let renamed = SessionUser { id: user.id, username: username.clone() };
    middleware::log_in(&session, &renamed).map_err(|e| BlogError::Session(e.to_string()))?;
    Ok(redirect(&profile_url(&username)))
}
