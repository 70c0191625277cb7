use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use content_index::{ContentPatch, ErrorKind, InMemoryStore, NewContentEntry};

use crate::support::{fixture, fixture_with, Fixture};

#[test]
fn hundred_concurrent_views_are_all_counted() {
    let Fixture { repo, .. } = fixture();
    let id = repo.create(NewContentEntry::new("t1", "c1")).unwrap();

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let repo = repo.clone();
            let id = id.clone();
            thread::spawn(move || repo.increment_view_count(&id).unwrap())
        })
        .collect();
    let returned: HashSet<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(repo.get_by_id(&id).unwrap().view_count, 100);
    // Every caller saw a distinct committed value.
    assert_eq!(returned, (1..=100).collect());
}

#[test]
fn zero_retry_budget_still_allows_one_attempt() {
    let Fixture { repo, .. } = fixture_with(InMemoryStore::with_max_increment_retries(0));
    let id = repo.create(NewContentEntry::new("t1", "c1")).unwrap();

    assert_eq!(repo.increment_view_count(&id).unwrap(), 1);
    assert_eq!(repo.increment_view_count(&id).unwrap(), 2);
}

#[test]
fn increment_of_unknown_id_is_not_found() {
    let Fixture { repo, .. } = fixture();
    let err = repo.increment_view_count("nope").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn concurrent_creates_all_land_in_the_index() {
    let Fixture { repo, .. } = fixture();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let repo = repo.clone();
            thread::spawn(move || {
                repo.create(NewContentEntry::new("t1", "c1").with_order(i))
                    .unwrap()
            })
        })
        .collect();
    let created: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(created.len(), 20);
    let listed = repo.list_by_topic("t1").unwrap();
    assert_eq!(listed.len(), 20);
    assert!(listed.windows(2).all(|w| w[0].order <= w[1].order));
    let indexed: HashSet<String> = repo.indexed_ids_for_course("c1").unwrap().into_iter().collect();
    assert_eq!(indexed, created);
}

#[test]
fn views_and_edits_interleave_without_losing_either() {
    let Fixture { repo, .. } = fixture();
    let id = repo.create(NewContentEntry::new("t1", "c1")).unwrap();
    let repo = Arc::new(repo);

    let viewers: Vec<_> = (0..10)
        .map(|_| {
            let repo = Arc::clone(&repo);
            let id = id.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    repo.increment_view_count(&id).unwrap();
                }
            })
        })
        .collect();
    let editor = {
        let repo = Arc::clone(&repo);
        let id = id.clone();
        thread::spawn(move || {
            for n in 0..5 {
                repo.update(&id, ContentPatch::new().title(format!("rev {}", n))).unwrap();
            }
        })
    };
    for handle in viewers {
        handle.join().unwrap();
    }
    editor.join().unwrap();

    let entry = repo.get_by_id(&id).unwrap();
    assert_eq!(entry.view_count, 50);
    assert_eq!(entry.title, "rev 4");
}
