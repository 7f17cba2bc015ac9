mod support;

use blogicum_backend::helper::blog_helpers::BlogError;
use blogicum_backend::helper::ownership_helpers::{self, Access, DenialPolicy, WriteDecision};
use blogicum_backend::models::db_operations::{comments_db_operations, posts_db_operations};
use blogicum_backend::models::Viewer;
use support::{add_category, add_post, add_user, memory_db, now, viewer, PostSpec};

#[test]
fn only_the_author_may_write_a_post() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    let post_id = add_post(&conn, &anna, PostSpec::live("mine", 1));
    let post = ownership_helpers::load_post_for_write(&conn, post_id).unwrap();

    assert_eq!(
        ownership_helpers::authorize(anna.id, &post, DenialPolicy::default()).unwrap(),
        Access::Granted
    );
    assert_eq!(
        ownership_helpers::authorize(boris.id, &post, DenialPolicy::default()).unwrap(),
        Access::Redirect(format!("/posts/{}/", post_id))
    );
    assert!(matches!(
        ownership_helpers::authorize(boris.id, &post, DenialPolicy { raise_on_denial: true }),
        Err(BlogError::Forbidden)
    ));
}

#[test]
fn author_can_reach_posts_readers_cannot_see() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    let hidden = add_category(&conn, "hidden", false);
    let draft = add_post(&conn, &anna, PostSpec::draft("draft"));
    let scheduled = add_post(&conn, &anna, PostSpec::scheduled("later", 10));
    let buried = add_post(&conn, &anna, PostSpec::live("buried", 1).in_category(hidden));

    for post_id in [draft, scheduled, buried] {
        let post = ownership_helpers::load_post_for_write(&conn, post_id).unwrap();
        assert_eq!(
            ownership_helpers::guard_write(&viewer(&anna), &post, DenialPolicy::default()).unwrap(),
            WriteDecision::Proceed(anna.clone())
        );
    }
}

#[test]
fn missing_post_is_not_found_before_login_is_considered() {
    let conn = memory_db();
    let res = ownership_helpers::load_post_for_write(&conn, 404);
    assert!(matches!(res, Err(BlogError::NotFound)));
}

#[test]
fn stranger_editing_a_comment_is_sent_to_the_post() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    let post_id = add_post(&conn, &anna, PostSpec::live("post", 1));
    let comment_id = comments_db_operations::create_comment(&conn, post_id, boris.id, "hello", now()).unwrap();
    let comment = ownership_helpers::load_comment_for_write(&conn, post_id, comment_id).unwrap();

    // The post's author does not own other people's comments.
    assert_eq!(
        ownership_helpers::guard_write(&viewer(&anna), &comment, DenialPolicy::default()).unwrap(),
        WriteDecision::RedirectToPost(format!("/posts/{}/", post_id))
    );
    assert_eq!(
        ownership_helpers::guard_write(&Viewer::Anonymous, &comment, DenialPolicy::default()).unwrap(),
        WriteDecision::RedirectToLogin
    );
    assert_eq!(
        ownership_helpers::guard_write(&viewer(&boris), &comment, DenialPolicy::default()).unwrap(),
        WriteDecision::Proceed(boris.clone())
    );
}

#[test]
fn comment_must_belong_to_the_post_in_the_url() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    let first = add_post(&conn, &anna, PostSpec::live("first", 2));
    let second = add_post(&conn, &anna, PostSpec::live("second", 1));
    let comment_id = comments_db_operations::create_comment(&conn, first, anna.id, "on first", now()).unwrap();

    assert!(ownership_helpers::load_comment_for_write(&conn, first, comment_id).is_ok());
    assert!(matches!(
        ownership_helpers::load_comment_for_write(&conn, second, comment_id),
        Err(BlogError::NotFound)
    ));
    assert!(matches!(
        ownership_helpers::load_comment_for_write(&conn, 999, comment_id),
        Err(BlogError::NotFound)
    ));
    assert!(matches!(
        ownership_helpers::load_comment_for_write(&conn, first, 999),
        Err(BlogError::NotFound)
    ));
}

#[test]
fn deleting_a_post_removes_its_comments() {
    let conn = memory_db();
    let anna = add_user(&conn, "anna");
    let boris = add_user(&conn, "boris");
    let post_id = add_post(&conn, &anna, PostSpec::live("doomed", 1));
    let comment_id = comments_db_operations::create_comment(&conn, post_id, boris.id, "bye", now()).unwrap();

    assert_eq!(posts_db_operations::delete_post(&conn, post_id).unwrap(), 1);

    assert!(posts_db_operations::find_post_by_id(&conn, post_id).unwrap().is_none());
    assert!(comments_db_operations::find_comment_for_post(&conn, post_id, comment_id).unwrap().is_none());
    assert!(comments_db_operations::read_comments_for_post(&conn, post_id).unwrap().is_empty());
}
