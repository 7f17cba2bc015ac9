mod support;

use blogicum_backend::helper::blog_helpers::BlogError;
use blogicum_backend::helper::form_helpers::{self, PostForm};
use blogicum_backend::helper::visibility_helpers::{self, FeedContext, LiveGate};
use blogicum_backend::models::db_operations::{categories_db_operations, comments_db_operations, posts_db_operations};
use blogicum_backend::models::{PostFilter, Viewer};
use chrono::Duration;
use support::{add_category, add_post, add_user, memory_db, now, viewer, PostSpec};

fn titles(feed: &visibility_helpers::Feed) -> Vec<String> {
    feed.page.items.iter().map(|card| card.post.title.clone()).collect()
}

#[test]
fn index_only_lists_live_posts_newest_first() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    let hidden = add_category(&conn, "hidden", false);
    let travel = add_category(&conn, "travel", true);

    add_post(&conn, &anna, PostSpec::live("old", 48));
    add_post(&conn, &anna, PostSpec::live("fresh", 1).in_category(travel));
    add_post(&conn, &anna, PostSpec::draft("draft"));
    add_post(&conn, &anna, PostSpec::scheduled("tomorrow", 24));
    add_post(&conn, &anna, PostSpec::live("in hidden category", 2).in_category(hidden));

    // The author gets no special treatment on the index.
    for who in [Viewer::Anonymous, viewer(&anna)] {
        let feed = visibility_helpers::visible_posts(&conn, &who, FeedContext::Global, now(), 1).unwrap();
        assert_eq!(titles(&feed), vec!["fresh", "old"]);
    }
}

#[test]
fn post_dated_exactly_now_is_live() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    add_post(&conn, &anna, PostSpec::live("on the dot", 0));

    let feed = visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Global, now(), 1).unwrap();
    assert_eq!(titles(&feed), vec!["on the dot"]);

    let earlier = now() - Duration::seconds(1);
    let feed = visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Global, earlier, 1).unwrap();
    assert!(feed.page.items.is_empty());
}

#[test]
fn same_date_posts_are_ordered_by_id() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    add_post(&conn, &anna, PostSpec::live("first", 3));
    add_post(&conn, &anna, PostSpec::live("second", 3));

    let feed = visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Global, now(), 1).unwrap();
    assert_eq!(titles(&feed), vec!["second", "first"]);
}

#[test]
fn category_feed_requires_a_published_category() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    let travel = add_category(&conn, "travel", true);
    let food = add_category(&conn, "food", true);
    add_category(&conn, "secret", false);

    add_post(&conn, &anna, PostSpec::live("trip", 5).in_category(travel));
    add_post(&conn, &anna, PostSpec::live("soup", 4).in_category(food));
    add_post(&conn, &anna, PostSpec::draft("unfinished trip").in_category(travel));

    let feed = visibility_helpers::visible_posts(&conn, &viewer(&anna), FeedContext::Category("travel"), now(), 1).unwrap();
    assert_eq!(titles(&feed), vec!["trip"]);
    assert_eq!(feed.category.unwrap().slug, "travel");

    for slug in ["secret", "nope"] {
        let res = visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Category(slug), now(), 1);
        assert!(matches!(res, Err(BlogError::NotFound)));
    }
}

#[test]
fn profile_shows_everything_only_to_its_owner() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    let hidden = add_category(&conn, "hidden", false);

    add_post(&conn, &anna, PostSpec::live("public", 3));
    add_post(&conn, &anna, PostSpec::draft("draft"));
    add_post(&conn, &anna, PostSpec::scheduled("scheduled", 5));
    add_post(&conn, &anna, PostSpec::live("buried", 2).in_category(hidden));
    add_post(&conn, &boris, PostSpec::live("not anna's", 1));

    let own = visibility_helpers::visible_posts(&conn, &viewer(&anna), FeedContext::Profile("anna"), now(), 1).unwrap();
    assert_eq!(titles(&own), vec!["scheduled", "draft", "buried", "public"]);

    for who in [Viewer::Anonymous, viewer(&boris)] {
        let public = visibility_helpers::visible_posts(&conn, &who, FeedContext::Profile("anna"), now(), 1).unwrap();
        assert_eq!(titles(&public), vec!["public"]);
    }

    let missing = visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Profile("ghost"), now(), 1);
    assert!(matches!(missing, Err(BlogError::NotFound)));
}

#[test]
fn detail_hides_non_live_posts_from_everyone_but_the_author() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    let draft = add_post(&conn, &anna, PostSpec::draft("draft"));
    let live = add_post(&conn, &anna, PostSpec::live("live", 1));

    assert!(visibility_helpers::fetch_post_for_viewer(&conn, &viewer(&anna), draft, now()).is_ok());
    for who in [Viewer::Anonymous, viewer(&boris)] {
        let res = visibility_helpers::fetch_post_for_viewer(&conn, &who, draft, now());
        assert!(matches!(res, Err(BlogError::NotFound)));
        assert!(visibility_helpers::fetch_post_for_viewer(&conn, &who, live, now()).is_ok());
    }

    let res = visibility_helpers::fetch_post_for_viewer(&conn, &Viewer::Anonymous, 9999, now());
    assert!(matches!(res, Err(BlogError::NotFound)));
}

#[test]
fn hiding_a_category_hides_its_posts_but_not_from_the_author() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    let travel = add_category(&conn, "travel", true);
    let post_id = add_post(&conn, &anna, PostSpec::live("trip", 1).in_category(travel));

    let before = visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Global, now(), 1).unwrap();
    assert_eq!(before.page.total, 1);

    categories_db_operations::set_category_published(&conn, "travel", false).unwrap();

    let after = visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Global, now(), 1).unwrap();
    assert_eq!(after.page.total, 0);
    assert!(matches!(
        visibility_helpers::fetch_post_for_viewer(&conn, &Viewer::Anonymous, post_id, now()),
        Err(BlogError::NotFound)
    ));
    assert!(visibility_helpers::fetch_post_for_viewer(&conn, &viewer(&anna), post_id, now()).is_ok());
}

#[test]
fn comment_counts_follow_new_comments() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    let post_id = add_post(&conn, &anna, PostSpec::live("chatty", 1));
    for i in 0..3 {
        comments_db_operations::create_comment(&conn, post_id, boris.id, &format!("c{}", i), now()).unwrap();
    }

    let count = |conn: &rusqlite::Connection| {
        let feed = visibility_helpers::visible_posts(conn, &Viewer::Anonymous, FeedContext::Global, now(), 1).unwrap();
        feed.page.items[0].comment_count
    };
    assert_eq!(count(&conn), 3);

    comments_db_operations::create_comment(&conn, post_id, anna.id, "one more", now()).unwrap();
    assert_eq!(count(&conn), 4);
}

#[test]
fn feeds_are_paginated_by_ten() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    for hours in 1..=25 {
        add_post(&conn, &anna, PostSpec::live("post", hours));
    }

    let first = visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Global, now(), 1).unwrap();
    assert_eq!(first.page.items.len(), 10);
    assert_eq!(first.page.num_pages, 3);
    assert!(first.page.has_next);
    assert!(!first.page.has_previous);

    let last = visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Global, now(), 3).unwrap();
    assert_eq!(last.page.items.len(), 5);
    assert!(!last.page.has_next);

    let beyond = visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Global, now(), 4);
    assert!(matches!(beyond, Err(BlogError::NotFound)));
}

#[test]
fn empty_feed_still_has_a_first_page() {
    let conn = memory_db();
    let feed = visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Global, now(), 1).unwrap();
    assert!(feed.page.items.is_empty());
    assert_eq!(feed.page.num_pages, 1);
}

#[test]
fn repeated_queries_give_the_same_feed() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    for hours in 1..=4 {
        add_post(&conn, &anna, PostSpec::live("post", hours));
    }

    let ids = || {
        visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Global, now(), 1)
            .unwrap()
            .page
            .items
            .iter()
            .map(|card| card.post.id)
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(), ids());
}

#[test]
fn query_gate_and_in_memory_gate_agree() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    let open = add_category(&conn, "open", true);
    let closed = add_category(&conn, "closed", false);

    let mut all = Vec::new();
    for category in [None, Some(open), Some(closed)] {
        for spec in [
            PostSpec::live("live", 2),
            PostSpec::live("now", 0),
            PostSpec::scheduled("later", 2),
            PostSpec::draft("draft"),
        ] {
            let spec = match category {
                Some(id) => spec.in_category(id),
                None => spec,
            };
            all.push(add_post(&conn, &anna, spec));
        }
    }

    let gate = LiveGate::at(now());
    let mut from_sql: Vec<i64> = posts_db_operations::read_post_cards(&conn, &gate.filter(), 100, 0)
        .unwrap()
        .into_iter()
        .map(|card| card.post.id)
        .collect();
    let mut from_memory: Vec<i64> = all
        .iter()
        .map(|id| posts_db_operations::find_post_by_id(&conn, *id).unwrap().unwrap())
        .filter(|post| gate.admits(post))
        .map(|post| post.id)
        .collect();
    from_sql.sort_unstable();
    from_memory.sort_unstable();

    assert_eq!(from_sql.len(), 4);
    assert_eq!(from_sql, from_memory);
    assert_eq!(posts_db_operations::count_posts(&conn, &PostFilter::default()).unwrap(), 12);
}

#[test]
fn five_digit_years_never_reach_the_feed() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    add_post(&conn, &anna, PostSpec::live("today", 1));

    let mut form = PostForm {
        title: "Far future".into(),
        text: "Not yet".into(),
        pub_date: "+10000-01-01T00:00".into(),
        ..PostForm::default()
    };
    assert!(matches!(
        form_helpers::validate_post_form(&conn, &form, now()),
        Err(BlogError::Validation(_))
    ));

    // The latest accepted date is stored and read back like any other.
    form.pub_date = "9999-12-31T23:59".into();
    let input = form_helpers::validate_post_form(&conn, &form, now()).unwrap();
    let far = posts_db_operations::create_post(&conn, anna.id, &input, now()).unwrap();

    let feed = visibility_helpers::visible_posts(&conn, &Viewer::Anonymous, FeedContext::Global, now(), 1).unwrap();
    assert_eq!(titles(&feed), vec!["today"]);
    let own = visibility_helpers::visible_posts(&conn, &viewer(&anna), FeedContext::Profile("anna"), now(), 1).unwrap();
    assert_eq!(titles(&own), vec!["Far future", "today"]);
    assert!(visibility_helpers::fetch_post_for_viewer(&conn, &viewer(&anna), far, now()).is_ok());
}
