use std::sync::mpsc;
use std::time::Duration;

use content_index::{ContentEntry, ContentPatch, NewContentEntry, SubscriptionState};

use crate::support::{fixture, ids, Fixture};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(300);

fn channel_sink() -> (
    impl Fn(Vec<ContentEntry>) + Send + 'static,
    mpsc::Receiver<Vec<ContentEntry>>,
) {
    let (tx, rx) = mpsc::channel();
    (
        move |entries: Vec<ContentEntry>| {
            let _ = tx.send(entries);
        },
        rx,
    )
}

/// Drain deliveries until one satisfies `pred`.
fn next_matching<F>(rx: &mpsc::Receiver<Vec<ContentEntry>>, pred: F) -> Vec<ContentEntry>
where
    F: Fn(&[ContentEntry]) -> bool,
{
    loop {
        let entries = rx.recv_timeout(WAIT).expect("timed out waiting for delivery");
        if pred(&entries) {
            return entries;
        }
    }
}

#[test]
fn observer_sees_sorted_topic_until_detached() {
    let Fixture { repo, store, .. } = fixture();
    let (sink, rx) = channel_sink();
    let sub = repo.observe_by_topic("t1", sink, |_| {}).unwrap();

    // Initial state of an empty topic.
    assert!(rx.recv_timeout(WAIT).unwrap().is_empty());

    let late = repo
        .create(NewContentEntry::new("t1", "c1").with_order(2))
        .unwrap();
    let early = repo
        .create(NewContentEntry::new("t1", "c1").with_order(1))
        .unwrap();

    let both = next_matching(&rx, |entries| entries.len() == 2);
    assert_eq!(ids(&both), vec![early.clone(), late]);

    sub.detach();
    assert_eq!(sub.state(), SubscriptionState::Detached);
    assert_eq!(store.listener_count(), 0);

    repo.create(NewContentEntry::new("t1", "c1").with_order(0)).unwrap();
    assert!(rx.recv_timeout(QUIET).is_err());
    assert_eq!(repo.list_by_topic("t1").unwrap().len(), 3);
}

#[test]
fn course_observer_follows_edits_and_soft_deletes() {
    let Fixture { repo, .. } = fixture();
    let a = repo
        .create(NewContentEntry::new("t1", "c1").with_order(1))
        .unwrap();
    let b = repo
        .create(NewContentEntry::new("t2", "c1").with_order(2))
        .unwrap();
    let (sink, rx) = channel_sink();
    let _sub = repo.observe_by_course("c1", sink, |_| {}).unwrap();

    assert_eq!(ids(&next_matching(&rx, |e| e.len() == 2)), vec![a.clone(), b.clone()]);

    repo.update(&a, ContentPatch::new().order(3)).unwrap();
    let reordered = next_matching(&rx, |e| e.first().map(|x| x.id.as_str()) == Some(b.as_str()));
    assert_eq!(ids(&reordered), vec![b.clone(), a.clone()]);

    repo.soft_delete(&b).unwrap();
    let remaining = next_matching(&rx, |e| e.len() == 1);
    assert_eq!(ids(&remaining), vec![a]);
}

#[test]
fn view_counts_reach_observers() {
    let Fixture { repo, .. } = fixture();
    let id = repo.create(NewContentEntry::new("t1", "c1")).unwrap();
    let (sink, rx) = channel_sink();
    let _sub = repo.observe_by_topic("t1", sink, |_| {}).unwrap();

    for _ in 0..3 {
        repo.increment_view_count(&id).unwrap();
    }

    let seen = next_matching(&rx, |e| e.len() == 1 && e[0].view_count == 3);
    assert_eq!(seen[0].id, id);
}

#[test]
fn two_observers_detach_independently() {
    let Fixture { repo, store, .. } = fixture();
    let (first_sink, first_rx) = channel_sink();
    let (second_sink, second_rx) = channel_sink();
    let first = repo.observe_by_topic("t1", first_sink, |_| {}).unwrap();
    let _second = repo.observe_by_topic("t1", second_sink, |_| {}).unwrap();
    first_rx.recv_timeout(WAIT).unwrap();
    second_rx.recv_timeout(WAIT).unwrap();

    first.detach();
    assert_eq!(store.listener_count(), 1);

    repo.create(NewContentEntry::new("t1", "c1")).unwrap();
    next_matching(&second_rx, |e| e.len() == 1);
    assert!(first_rx.recv_timeout(QUIET).is_err());
}
