//! Shared fixtures for content integration tests.

use std::sync::Arc;

use content_index::{
    BackingStore, Clock, ContentConfig, ContentEntry, ContentRepository, InMemoryStore,
    ManualClock,
};

pub struct Fixture {
    pub repo: ContentRepository<InMemoryStore>,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
}

pub fn fixture() -> Fixture {
    fixture_with(InMemoryStore::new())
}

pub fn fixture_with(store: InMemoryStore) -> Fixture {
    let store = Arc::new(store);
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let mut config = ContentConfig::default();
    config.live.detach_timeout_ms = 200;
    let repo = ContentRepository::with_clock(
        Arc::clone(&store),
        &config,
        Arc::clone(&clock) as Arc<dyn Clock>,
    )
    .unwrap();
    Fixture { repo, store, clock }
}

pub fn ids(entries: &[ContentEntry]) -> Vec<String> {
    entries.iter().map(|entry| entry.id.clone()).collect()
}

/// Every `index/key` node in either index that still names `id`.
pub fn indexed_anywhere(store: &InMemoryStore, id: &str) -> Vec<String> {
    let mut hits = Vec::new();
    for index in ["explanationsByTopic", "explanationsByCourse"] {
        let Some(node) = store.get(index).unwrap() else {
            continue;
        };
        for (key, markers) in node.as_object().unwrap() {
            if markers.get(id).is_some() {
                hits.push(format!("{}/{}", index, key));
            }
        }
    }
    hits
}
