use crate::config::Config;
use crate::helper::blog_helpers::BlogError;
use crate::models::db_operations::{comments_db_operations, posts_db_operations};
use crate::models::{Comment, Post, SessionUser, Viewer};
use rusqlite::Connection;

/// Something only its author may change.
pub trait Owned {
    fn author_id(&self) -> i64;
    /// The post whose page a denied viewer is sent back to.
    fn owning_post_id(&self) -> i64;
}

impl Owned for Post {
    fn author_id(&self) -> i64 {
        self.author.id
    }

    fn owning_post_id(&self) -> i64 {
        self.id
    }
}

impl Owned for Comment {
    fn author_id(&self) -> i64 {
        self.author.id
    }

    fn owning_post_id(&self) -> i64 {
        self.post_id
    }
}

/// What to do with a viewer who is not the author.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DenialPolicy {
    /// `false`: send the viewer to the owning post. `true`: fail with 403.
    pub raise_on_denial: bool,
}

impl From<&Config> for DenialPolicy {
    fn from(config: &Config) -> Self {
        DenialPolicy { raise_on_denial: config.raise_on_denial }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted,
    Redirect(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteDecision {
    Proceed(SessionUser),
    RedirectToLogin,
    RedirectToPost(String),
}

pub fn post_detail_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

pub fn authorize<R: Owned>(viewer_id: i64, resource: &R, policy: DenialPolicy) -> Result<Access, BlogError> {
    if resource.author_id() == viewer_id {
        return Ok(Access::Granted);
    }
    if policy.raise_on_denial {
        return Err(BlogError::Forbidden);
    }
    Ok(Access::Redirect(post_detail_url(resource.owning_post_id())))
}

/// Decides a write request once its target has been found. Anonymous viewers
/// go to the login page before ownership is looked at.
pub fn guard_write<R: Owned>(viewer: &Viewer, resource: &R, policy: DenialPolicy) -> Result<WriteDecision, BlogError> {
    let user = match viewer {
        Viewer::Anonymous => return Ok(WriteDecision::RedirectToLogin),
        Viewer::User(user) => user,
    };
    match authorize(user.id, resource, policy)? {
        Access::Granted => Ok(WriteDecision::Proceed(user.clone())),
        Access::Redirect(url) => {
            log::warn!(
                "User '{}' tried to modify content owned by user {}; sending them to {}",
                user.username,
                resource.author_id(),
                url
            );
            Ok(WriteDecision::RedirectToPost(url))
        }
    }
}

/// Write-path lookup. Unfiltered, so an author can reach a draft, a
/// scheduled post, or a post in a category that was hidden later.
pub fn load_post_for_write(conn: &Connection, post_id: i64) -> Result<Post, BlogError> {
    posts_db_operations::find_post_by_id(conn, post_id)?.ok_or(BlogError::NotFound)
}

/// Write-path comment lookup. The post must exist and the comment must
/// belong to it, whoever is asking.
pub fn load_comment_for_write(conn: &Connection, post_id: i64, comment_id: i64) -> Result<Comment, BlogError> {
    if !posts_db_operations::post_exists(conn, post_id)? {
        return Err(BlogError::NotFound);
    }
    comments_db_operations::find_comment_for_post(conn, post_id, comment_id)?.ok_or(BlogError::NotFound)
}
