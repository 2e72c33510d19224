//! Affirmation Feed Tests
//!
//! Covers loading, viewer flags, optimistic toggles, creation and
//! session-driven reloads.

mod common;

use std::sync::Arc;

use common::{affirmation, eventually, viewer, FlakyStore};
use embrace::domain::engagement::LikeTarget;
use embrace::infra::memory::MemoryStore;
use embrace::infra::store::ContentStore;
use embrace::sync::{AffirmationFeed, CreateError, Session};
use uuid::Uuid;

struct Fixture {
    store: Arc<MemoryStore>,
    flaky: Arc<FlakyStore>,
    session: Session,
    feed: AffirmationFeed,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let flaky = Arc::new(FlakyStore::new(store.clone()));
    let session = Session::new();
    let feed = AffirmationFeed::new(flaky.clone(), session.clone());
    Fixture {
        store,
        flaky,
        session,
        feed,
    }
}

async fn seed(store: &MemoryStore, content: &str, likes_count: i64, minutes_ago: i64) -> Uuid {
    let item = affirmation(content, false, likes_count, minutes_ago);
    let id = item.id;
    store.seed_affirmation(item).await;
    id
}

// ===========================================================================
// Loading
// ===========================================================================

#[tokio::test]
async fn starts_loading_until_first_fetch() {
    let f = fixture();
    seed(&f.store, "hello", 0, 1).await;

    assert!(f.feed.loading().await);
    assert!(f.feed.affirmations().await.is_empty());

    f.feed.fetch_all().await;

    assert!(!f.feed.loading().await);
    assert_eq!(f.feed.affirmations().await.len(), 1);
}

#[tokio::test]
async fn anonymous_viewer_gets_no_flags() {
    let f = fixture();
    seed(&f.store, "hello", 4, 1).await;

    f.feed.fetch_all().await;

    let items = f.feed.affirmations().await;
    assert_eq!(items[0].is_liked, None);
    assert_eq!(items[0].is_saved, None);
    assert!(!f.feed.can_interact());
}

#[tokio::test]
async fn signed_in_viewer_gets_own_flags() {
    let f = fixture();
    let me = viewer(&f.store, "me").await;
    let liked = seed(&f.store, "liked", 0, 3).await;
    let saved = seed(&f.store, "saved", 0, 2).await;
    let plain = seed(&f.store, "plain", 0, 1).await;
    f.store.set_affirmation_like(me.id, liked, true).await.unwrap();
    f.store.set_affirmation_saved(me.id, saved, true).await.unwrap();
    f.session.sign_in_as(me, None);

    f.feed.fetch_all().await;

    let items = f.feed.affirmations().await;
    let ids: Vec<Uuid> = items.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![plain, saved, liked]);
    assert_eq!(items[0].is_liked, Some(false));
    assert_eq!(items[0].is_saved, Some(false));
    assert_eq!(items[1].is_saved, Some(true));
    assert_eq!(items[1].is_liked, Some(false));
    assert_eq!(items[2].is_liked, Some(true));
    assert_eq!(items[2].likes_count, 1);
}

#[tokio::test]
async fn failed_membership_query_counts_as_empty() {
    let f = fixture();
    let me = viewer(&f.store, "me").await;
    let id = seed(&f.store, "liked", 0, 1).await;
    f.store.set_affirmation_like(me.id, id, true).await.unwrap();
    f.session.sign_in_as(me, None);
    FlakyStore::set(&f.flaky.fail_membership, true);

    f.feed.fetch_all().await;

    let items = f.feed.affirmations().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].is_liked, Some(false));
    assert_eq!(items[0].is_saved, Some(false));
}

#[tokio::test]
async fn failed_list_keeps_previous_items() {
    let f = fixture();
    seed(&f.store, "kept", 0, 1).await;
    f.feed.fetch_all().await;

    FlakyStore::set(&f.flaky.fail_lists, true);
    seed(&f.store, "unseen", 0, 0).await;
    f.feed.refetch().await;

    let items = f.feed.affirmations().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].content, "kept");
    assert!(!f.feed.loading().await);
}

#[tokio::test]
async fn first_fetch_failure_still_ends_loading() {
    let f = fixture();
    FlakyStore::set(&f.flaky.fail_lists, true);

    f.feed.fetch_all().await;

    assert!(!f.feed.loading().await);
    assert!(f.feed.affirmations().await.is_empty());
}

// ===========================================================================
// Toggles
// ===========================================================================

#[tokio::test]
async fn toggle_like_updates_local_and_remote() {
    let f = fixture();
    let me = viewer(&f.store, "me").await;
    let id = seed(&f.store, "like me", 5, 1).await;
    f.session.sign_in_as(me.clone(), None);
    f.feed.fetch_all().await;

    f.feed.toggle_like(id).await;

    let items = f.feed.affirmations().await;

    let item = &items[0];
    assert_eq!(item.is_liked, Some(true));
    assert_eq!(item.likes_count, 6);
    assert_eq!(f.store.like_count(LikeTarget::Affirmation(id)).await, 1);

    f.feed.toggle_like(id).await;

    let items = f.feed.affirmations().await;

    let item = &items[0];
    assert_eq!(item.is_liked, Some(false));
    assert_eq!(item.likes_count, 5);
    assert_eq!(f.store.like_count(LikeTarget::Affirmation(id)).await, 0);
}

#[tokio::test]
async fn toggle_like_signed_out_is_noop() {
    let f = fixture();
    let id = seed(&f.store, "like me", 5, 1).await;
    f.feed.fetch_all().await;

    f.feed.toggle_like(id).await;

    let items = f.feed.affirmations().await;

    let item = &items[0];
    assert_eq!(item.is_liked, None);
    assert_eq!(item.likes_count, 5);
    assert_eq!(f.store.like_count(LikeTarget::Affirmation(id)).await, 0);
}

#[tokio::test]
async fn toggle_like_unknown_id_is_noop() {
    let f = fixture();
    let me = viewer(&f.store, "me").await;
    seed(&f.store, "only", 2, 1).await;
    f.session.sign_in_as(me, None);
    f.feed.fetch_all().await;
    let before = f.feed.affirmations().await;

    f.feed.toggle_like(Uuid::new_v4()).await;

    assert_eq!(f.feed.affirmations().await, before);
}

#[tokio::test]
async fn failed_write_still_flips_locally() {
    let f = fixture();
    let me = viewer(&f.store, "me").await;
    let id = seed(&f.store, "flaky", 5, 1).await;
    f.session.sign_in_as(me, None);
    f.feed.fetch_all().await;
    FlakyStore::set(&f.flaky.fail_writes, true);

    f.feed.toggle_like(id).await;

    // No rollback: local state diverges from the store.
    let items = f.feed.affirmations().await;
    let item = &items[0];
    assert_eq!(item.is_liked, Some(true));
    assert_eq!(item.likes_count, 6);
    assert_eq!(f.store.like_count(LikeTarget::Affirmation(id)).await, 0);

    // The next fetch reconciles.
    FlakyStore::set(&f.flaky.fail_writes, false);
    f.feed.refetch().await;
    let items = f.feed.affirmations().await;
    let item = &items[0];
    assert_eq!(item.is_liked, Some(false));
    assert_eq!(item.likes_count, 5);
}

#[tokio::test]
async fn local_counter_never_goes_negative() {
    let f = fixture();
    let me = viewer(&f.store, "me").await;
    let id = seed(&f.store, "drifted", 0, 1).await;
    f.store.set_affirmation_like(me.id, id, true).await.unwrap();
    f.store
        .force_likes_count(LikeTarget::Affirmation(id), 0)
        .await;
    f.session.sign_in_as(me, None);
    f.feed.fetch_all().await;
    assert_eq!(f.feed.affirmations().await[0].is_liked, Some(true));

    f.feed.toggle_like(id).await;

    let items = f.feed.affirmations().await;

    let item = &items[0];
    assert_eq!(item.is_liked, Some(false));
    assert_eq!(item.likes_count, 0);
}

#[tokio::test]
async fn toggle_save_leaves_likes_alone() {
    let f = fixture();
    let me = viewer(&f.store, "me").await;
    let id = seed(&f.store, "save me", 9, 1).await;
    f.session.sign_in_as(me.clone(), None);
    f.feed.fetch_all().await;

    f.feed.toggle_save(id).await;

    let items = f.feed.affirmations().await;

    let item = &items[0];
    assert_eq!(item.is_saved, Some(true));
    assert_eq!(item.is_liked, Some(false));
    assert_eq!(item.likes_count, 9);
    assert_eq!(f.store.saved_affirmation_ids(me.id, &[id]).await.unwrap(), vec![id]);

    f.feed.toggle_save(id).await;

    assert_eq!(f.feed.affirmations().await[0].is_saved, Some(false));
    assert!(f.store.saved_affirmation_ids(me.id, &[id]).await.unwrap().is_empty());
}

// ===========================================================================
// Creation
// ===========================================================================

#[tokio::test]
async fn create_requires_viewer() {
    let f = fixture();

    let err = f
        .feed
        .create_affirmation("I am enough", "self-worth", None)
        .await
        .unwrap_err();

    assert!(matches!(err, CreateError::NotAuthenticated));
    assert!(f.store.list_affirmations().await.unwrap().is_empty());
}

#[tokio::test]
async fn create_rejects_blank_fields() {
    let f = fixture();
    let me = viewer(&f.store, "me").await;
    f.session.sign_in_as(me, None);

    let err = f
        .feed
        .create_affirmation("   ", "body", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CreateError::Invalid("content is required")));

    let err = f
        .feed
        .create_affirmation("hi", "", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CreateError::Invalid("category is required")));
}

#[tokio::test]
async fn create_rejects_oversized_fields() {
    let f = fixture();
    let me = viewer(&f.store, "me").await;
    f.session.sign_in_as(me, None);

    let err = f
        .feed
        .create_affirmation(&"a".repeat(5000), "body", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CreateError::Invalid("content must be at most 2000 characters")
    ));

    let err = f
        .feed
        .create_affirmation("I am enough", &"c".repeat(200), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CreateError::Invalid("category must be at most 64 characters")
    ));

    assert!(f.store.list_affirmations().await.unwrap().is_empty());
}

#[tokio::test]
async fn create_reloads_feed() {
    let f = fixture();
    let me = viewer(&f.store, "me").await;
    seed(&f.store, "existing", 0, 5).await;
    f.session.sign_in_as(me.clone(), None);
    f.feed.fetch_all().await;

    let created = f
        .feed
        .create_affirmation("  I am enough  ", "self-worth", None)
        .await
        .unwrap();

    assert_eq!(created.content, "I am enough");
    assert_eq!(created.category, "self-worth");
    assert_eq!(created.user_id, Some(me.id));
    assert!(!created.is_featured);
    assert_eq!(created.likes_count, 0);

    let items = f.feed.affirmations().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, created.id);
    assert_eq!(items[0].category, "self-worth");
    assert_eq!(items[0].author.as_ref().map(|a| a.full_name.as_str()), Some("me"));
    assert_eq!(items[0].is_liked, Some(false));
}

#[tokio::test]
async fn create_surfaces_remote_errors() {
    let f = fixture();
    let me = viewer(&f.store, "me").await;
    f.session.sign_in_as(me, None);
    FlakyStore::set(&f.flaky.fail_writes, true);

    let err = f
        .feed
        .create_affirmation("hello", "body", None)
        .await
        .unwrap_err();

    assert!(matches!(err, CreateError::Remote(_)));
    assert_eq!(err.to_string(), "injected write failure");
}

// ===========================================================================
// Session changes
// ===========================================================================

#[tokio::test]
async fn sync_task_reloads_on_identity_change() {
    let f = fixture();
    let me = viewer(&f.store, "me").await;
    let id = seed(&f.store, "liked and saved", 0, 1).await;
    f.store.set_affirmation_like(me.id, id, true).await.unwrap();
    f.store.set_affirmation_saved(me.id, id, true).await.unwrap();

    let feed = &f.feed;
    let task = feed.spawn_sync();
    assert!(
        eventually(move || async move { !feed.loading().await }).await,
        "initial load never finished"
    );
    let items = feed.affirmations().await;
    assert_eq!(items[0].is_liked, None);
    assert_eq!(items[0].is_saved, None);

    f.session.sign_in_as(me, None);
    assert!(
        eventually(move || async move {
            let items = feed.affirmations().await;
            items[0].is_liked == Some(true) && items[0].is_saved == Some(true)
        })
        .await,
        "sign-in did not reload flags"
    );

    f.session.sign_out();
    assert!(
        eventually(move || async move {
            let items = feed.affirmations().await;
            items[0].is_liked.is_none() && items[0].is_saved.is_none()
        })
        .await,
        "sign-out did not clear flags"
    );
    assert!(!feed.can_interact());

    task.abort();
}
