//! Which posts a viewer is allowed to read.
//!
//! Non-authors only ever see live posts: published, with a publication date
//! that has passed, and either no category or a published one. Authors see
//! everything they wrote on their own profile and on the post page. Anything
//! a viewer may not see is reported as `NotFound`, never as forbidden.
//!
//! Every function takes the request's `now` explicitly so one decision is
//! made against one instant.

use crate::helper::blog_helpers::BlogError;
use crate::models::db_operations::{categories_db_operations, comments_db_operations, posts_db_operations, users_db_operations};
use crate::models::{Category, Comment, Page, Post, PostCard, PostFilter, User, Viewer};
use crate::POSTS_PER_PAGE;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

/// The listing a feed request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedContext<'a> {
    Global,
    Category(&'a str),
    Profile(&'a str),
}

/// The live-only gate, bound to one instant.
#[derive(Debug, Clone, Copy)]
pub struct LiveGate {
    now: DateTime<Utc>,
}

impl LiveGate {
    pub fn at(now: DateTime<Utc>) -> Self {
        LiveGate { now }
    }

    /// In-memory form, used on a single fetched post.
    pub fn admits(&self, post: &Post) -> bool {
        post.is_live(self.now)
    }

    /// Query form, used for feeds.
    pub fn filter(&self) -> PostFilter {
        PostFilter { live_at: Some(self.now), ..PostFilter::default() }
    }
}

/// A resolved feed: the page of posts plus whatever the feed is about.
#[derive(Debug, Clone)]
pub struct Feed {
    pub category: Option<Category>,
    pub profile: Option<User>,
    pub page: Page<PostCard>,
}

/// Whether the live-only gate applies. It is lifted only when the viewer is
/// the owner of the content being listed or fetched.
pub fn restrict_to_live(viewer: &Viewer, owner_id: Option<i64>) -> bool {
    match owner_id {
        Some(owner) => !viewer.is_user(owner),
        None => true,
    }
}

/// Parses a `?page=` value. Missing means the first page; anything that is
/// not a positive integer is a page that does not exist.
pub fn parse_page_number(raw: Option<&str>) -> Result<u32, BlogError> {
    match raw {
        None => Ok(1),
        Some(value) => match value.trim().parse::<u32>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(BlogError::NotFound),
        },
    }
}

fn paginate(conn: &Connection, filter: &PostFilter, number: u32) -> Result<Page<PostCard>, BlogError> {
    let total = posts_db_operations::count_posts(conn, filter)?;
    let per_page = u64::from(POSTS_PER_PAGE);
    let num_pages = u32::try_from(total.div_ceil(per_page).max(1)).unwrap_or(u32::MAX);

    // Page 1 always exists, even for an empty feed.
    if number > num_pages {
        return Err(BlogError::NotFound);
    }

    let offset = (number - 1).saturating_mul(POSTS_PER_PAGE);
    let items = posts_db_operations::read_post_cards(conn, filter, POSTS_PER_PAGE, offset)?;
    Ok(Page {
        items,
        number,
        num_pages,
        total,
        has_previous: number > 1,
        has_next: number < num_pages,
    })
}

/// Resolves a feed for `viewer`. Results are newest first, paginated, and
/// carry a comment count counted at query time.
pub fn visible_posts(
    conn: &Connection,
    viewer: &Viewer,
    context: FeedContext<'_>,
    now: DateTime<Utc>,
    page_number: u32,
) -> Result<Feed, BlogError> {
    let gate = LiveGate::at(now);
    match context {
        FeedContext::Global => {
            // The index never shows drafts, not even to their author.
            let page = paginate(conn, &gate.filter(), page_number)?;
            Ok(Feed { category: None, profile: None, page })
        }
        FeedContext::Category(slug) => {
            let category = categories_db_operations::read_published_category_by_slug(conn, slug)?
                .ok_or(BlogError::NotFound)?;
            let filter = PostFilter { category_id: Some(category.id), ..gate.filter() };
            let page = paginate(conn, &filter, page_number)?;
            Ok(Feed { category: Some(category), profile: None, page })
        }
        FeedContext::Profile(username) => {
            let profile = users_db_operations::read_user_by_username(conn, username)?
                .ok_or(BlogError::NotFound)?;
            let base = if restrict_to_live(viewer, Some(profile.id)) {
                gate.filter()
            } else {
                PostFilter::default()
            };
            let filter = PostFilter { author_id: Some(profile.id), ..base };
            let page = paginate(conn, &filter, page_number)?;
            Ok(Feed { category: None, profile: Some(profile), page })
        }
    }
}

/// Fetches one post for reading. The lookup itself is unfiltered; the gate
/// is then applied to everyone except the post's author.
pub fn fetch_post_for_viewer(
    conn: &Connection,
    viewer: &Viewer,
    post_id: i64,
    now: DateTime<Utc>,
) -> Result<Post, BlogError> {
    let post = posts_db_operations::find_post_by_id(conn, post_id)?.ok_or(BlogError::NotFound)?;
    if restrict_to_live(viewer, Some(post.author.id)) && !LiveGate::at(now).admits(&post) {
        return Err(BlogError::NotFound);
    }
    Ok(post)
}

/// Post page data: the post and its comments, oldest comment first.
pub fn post_detail(
    conn: &Connection,
    viewer: &Viewer,
    post_id: i64,
    now: DateTime<Utc>,
) -> Result<(Post, Vec<Comment>), BlogError> {
    let post = fetch_post_for_viewer(conn, viewer, post_id, now)?;
    let comments = comments_db_operations::read_comments_for_post(conn, post.id)?;
    Ok((post, comments))
}
