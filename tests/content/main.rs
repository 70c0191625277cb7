//! Integration tests for the content repository.

mod concurrency;
mod live;
mod support;

use content_index::{
    ContentKind, ContentPatch, ContentRepository, ErrorKind, InMemoryStore, NewContentEntry,
};
use support::{fixture, ids, Fixture};

#[test]
fn created_entry_starts_active_and_unviewed() {
    let Fixture { repo, .. } = fixture();
    let id = repo
        .create(
            NewContentEntry::new("t1", "c1")
                .with_title("Fractions")
                .with_kind(ContentKind::Video)
                .with_resource_url("https://cdn.example/fractions.mp4")
                .with_duration(9),
        )
        .unwrap();

    let entry = repo.get_by_id(&id).unwrap();
    assert!(entry.active);
    assert_eq!(entry.view_count, 0);
    assert_eq!(entry.created_at, entry.updated_at);
    assert_eq!(entry.topic_id, "t1");
    assert_eq!(entry.course_id, "c1");
    assert_eq!(
        entry.resource_url.as_deref(),
        Some("https://cdn.example/fractions.mp4")
    );
}

#[test]
fn hard_delete_removes_every_trace() {
    let Fixture { repo, store, .. } = fixture();
    let id = repo.create(NewContentEntry::new("t1", "c1")).unwrap();
    let other = repo.create(NewContentEntry::new("t1", "c2")).unwrap();

    repo.hard_delete(&id).unwrap();

    assert_eq!(repo.get_by_id(&id).unwrap_err().kind(), ErrorKind::NotFound);
    assert!(!repo.indexed_ids_for_topic("t1").unwrap().contains(&id));
    assert!(!repo.indexed_ids_for_course("c1").unwrap().contains(&id));
    assert!(support::indexed_anywhere(&store, &id).is_empty());
    assert_eq!(repo.indexed_ids_for_topic("t1").unwrap(), vec![other]);
}

#[test]
fn hard_delete_twice_is_not_found() {
    let Fixture { repo, .. } = fixture();
    let id = repo.create(NewContentEntry::new("t1", "c1")).unwrap();
    repo.hard_delete(&id).unwrap();
    assert_eq!(repo.hard_delete(&id).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn soft_deleted_entry_is_hidden_but_fetchable() {
    let Fixture { repo, .. } = fixture();
    let id = repo.create(NewContentEntry::new("t1", "c1")).unwrap();

    repo.soft_delete(&id).unwrap();

    assert!(!ids(&repo.list_by_topic("t1").unwrap()).contains(&id));
    assert!(!ids(&repo.list_by_course("c1").unwrap()).contains(&id));
    assert!(!repo.get_by_id(&id).unwrap().active);
    assert!(repo.indexed_ids_for_topic("t1").unwrap().contains(&id));
}

#[test]
fn soft_deleted_entry_is_frozen() {
    let Fixture { repo, .. } = fixture();
    let id = repo.create(NewContentEntry::new("t1", "c1").with_title("Kept")).unwrap();
    repo.soft_delete(&id).unwrap();

    let edit = repo.update(&id, ContentPatch::new().title("edited after delete"));
    let view = repo.increment_view_count(&id);

    assert_eq!(edit.unwrap_err().kind(), ErrorKind::StoreWriteFailed);
    assert_eq!(view.unwrap_err().kind(), ErrorKind::StoreWriteFailed);
    let entry = repo.get_by_id(&id).unwrap();
    assert_eq!(entry.title, "Kept");
    assert_eq!(entry.view_count, 0);
}

#[test]
fn soft_delete_bumps_updated_at() {
    let Fixture { repo, clock, .. } = fixture();
    let id = repo.create(NewContentEntry::new("t1", "c1")).unwrap();
    clock.advance(1_000);

    repo.soft_delete(&id).unwrap();

    let entry = repo.get_by_id(&id).unwrap();
    assert_eq!(entry.updated_at, entry.created_at + 1_000);
}

#[test]
fn later_created_lower_order_lists_first() {
    let Fixture { repo, .. } = fixture();
    let first = repo
        .create(NewContentEntry::new("t1", "c1").with_order(2))
        .unwrap();
    let second = repo
        .create(NewContentEntry::new("t1", "c1").with_order(1))
        .unwrap();

    assert_eq!(ids(&repo.list_by_topic("t1").unwrap()), vec![second, first]);
}

#[test]
fn topic_listing_is_sorted_whatever_the_insertion_order() {
    let orders = [3, 1, 4, 0, 2];
    for rotation in 0..orders.len() {
        let Fixture { repo, .. } = fixture();
        for i in 0..orders.len() {
            let order = orders[(i + rotation) % orders.len()];
            repo.create(NewContentEntry::new("t1", "c1").with_order(order)).unwrap();
        }

        let listed: Vec<i64> = repo
            .list_by_topic("t1")
            .unwrap()
            .iter()
            .map(|entry| entry.order)
            .collect();
        assert_eq!(listed, vec![0, 1, 2, 3, 4], "rotation {}", rotation);
    }
}

#[test]
fn reordering_through_update_changes_listing() {
    let Fixture { repo, .. } = fixture();
    let a = repo
        .create(NewContentEntry::new("t1", "c1").with_order(1))
        .unwrap();
    let b = repo
        .create(NewContentEntry::new("t1", "c1").with_order(2))
        .unwrap();

    repo.update(&a, ContentPatch::new().order(3)).unwrap();

    assert_eq!(ids(&repo.list_by_topic("t1").unwrap()), vec![b, a]);
}

#[test]
fn search_skips_soft_deleted_matches() {
    let Fixture { repo, .. } = fixture();
    let visible = repo
        .create(NewContentEntry::new("t1", "c1").with_body("Intro to quiz"))
        .unwrap();
    let hidden = repo
        .create(NewContentEntry::new("t1", "c1").with_body("QUIZ basics"))
        .unwrap();
    repo.soft_delete(&hidden).unwrap();

    assert_eq!(ids(&repo.search("quiz").unwrap()), vec![visible]);
}

#[test]
fn statistics_follow_views_and_edits() {
    let Fixture { repo, clock, .. } = fixture();
    let id = repo
        .create(NewContentEntry::new("t1", "c1").with_duration(15))
        .unwrap();
    repo.increment_view_count(&id).unwrap();
    repo.increment_view_count(&id).unwrap();
    clock.advance(5);
    repo.update(&id, ContentPatch::new().kind(ContentKind::Document)).unwrap();

    let stats = repo.statistics(&id).unwrap();
    assert_eq!(stats.view_count, 2);
    assert_eq!(stats.estimated_duration_minutes, 15);
    assert_eq!(stats.kind, ContentKind::Document);
    assert_eq!(stats.updated_at, stats.created_at + 5);
}

#[test]
fn failed_create_leaves_a_tolerated_gap() {
    let Fixture { repo, store, .. } = fixture();
    let kept = repo.create(NewContentEntry::new("t1", "c1")).unwrap();
    store.fail_writes_under("explanationsByTopic");

    let err = repo.create(NewContentEntry::new("t1", "c1")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreWriteFailed);

    // The record exists but is not reachable through the topic index.
    assert_eq!(ids(&repo.list_by_topic("t1").unwrap()), vec![kept]);
    assert_eq!(repo.search("").unwrap().len(), 2);
}

#[test]
fn custom_collection_paths_are_honoured() {
    let mut config = content_index::ContentConfig::default();
    config.paths.entries = "lessons".into();
    config.paths.by_topic = "lessonsByTopic".into();
    config.paths.by_course = "lessonsByCourse".into();
    let store = std::sync::Arc::new(InMemoryStore::new());
    let repo = ContentRepository::with_config(std::sync::Arc::clone(&store), &config).unwrap();

    let id = repo.create(NewContentEntry::new("t1", "c1")).unwrap();

    use content_index::BackingStore;
    assert!(store.get(&format!("lessons/{}", id)).unwrap().is_some());
    assert!(store.get("explanations").unwrap().is_none());
    assert_eq!(repo.list_by_topic("t1").unwrap().len(), 1);
}

#[test]
fn overlapping_index_roots_are_refused() {
    let mut config = content_index::ContentConfig::default();
    config.paths.by_course = config.paths.by_topic.clone();

    let store = std::sync::Arc::new(InMemoryStore::new());
    let outcome = ContentRepository::with_config(store, &config);

    assert!(matches!(
        outcome,
        Err(content_index::ConfigError::InvalidValue(_))
    ));
}
