//! ContentRepository - one facade over the maintainer, query engine, counter
//! and live sync, all sharing a single injected store.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, ContentConfig};
use crate::counter::ViewCounter;
use crate::entry::{ContentEntry, ContentPatch, EntryStatistics, NewContentEntry};
use crate::error::{ContentError, Result};
use crate::index::IndexMaintainer;
use crate::live::{LiveSync, Subscription};
use crate::paths::CollectionPaths;
use crate::query::QueryEngine;
use crate::store::BackingStore;

/// Content entries with secondary indices, view counting and live sync.
///
/// Clone-friendly: clones share the same store.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use content_index::{ContentRepository, InMemoryStore, NewContentEntry};
///
/// let repo = ContentRepository::new(Arc::new(InMemoryStore::new()));
/// let id = repo
///     .create(NewContentEntry::new("t1", "c1").with_title("Intro to quiz"))
///     .unwrap();
///
/// assert_eq!(repo.list_by_topic("t1").unwrap()[0].id, id);
/// assert_eq!(repo.search("QUIZ").unwrap().len(), 1);
/// ```
pub struct ContentRepository<S> {
    store: Arc<S>,
    maintainer: IndexMaintainer<S>,
    query: QueryEngine<S>,
    counter: ViewCounter<S>,
    live: LiveSync<S>,
}

impl<S> Clone for ContentRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            maintainer: self.maintainer.clone(),
            query: self.query.clone(),
            counter: self.counter.clone(),
            live: self.live.clone(),
        }
    }
}

impl<S: BackingStore + 'static> ContentRepository<S> {
    /// Repository with default paths, wall-clock time and default timeouts.
    pub fn new(store: Arc<S>) -> Self {
        let defaults = ContentConfig::default();
        Self::assemble(
            store,
            defaults.paths,
            Arc::new(SystemClock),
            defaults.live.detach_timeout(),
        )
    }

    /// Repository over `config`, which is validated the same way a loaded
    /// config file is.
    pub fn with_config(
        store: Arc<S>,
        config: &ContentConfig,
    ) -> std::result::Result<Self, ConfigError> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<S>,
        config: &ContentConfig,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(
            store,
            config.paths.clone(),
            clock,
            config.live.detach_timeout(),
        ))
    }

    fn assemble(
        store: Arc<S>,
        paths: CollectionPaths,
        clock: Arc<dyn Clock>,
        detach_timeout: Duration,
    ) -> Self {
        Self {
            maintainer: IndexMaintainer::new(Arc::clone(&store), paths.clone(), clock),
            query: QueryEngine::new(Arc::clone(&store), paths.clone()),
            counter: ViewCounter::new(Arc::clone(&store), paths.clone()),
            live: LiveSync::new(Arc::clone(&store), paths, detach_timeout),
            store,
        }
    }

    /// The shared backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub fn create(&self, new: NewContentEntry) -> Result<String> {
        self.maintainer.create(new)
    }

    pub fn update(&self, id: &str, patch: ContentPatch) -> Result<()> {
        self.maintainer.update(id, patch)
    }

    pub fn soft_delete(&self, id: &str) -> Result<()> {
        self.maintainer.soft_delete(id)
    }

    pub fn hard_delete(&self, id: &str) -> Result<()> {
        self.maintainer.hard_delete(id)
    }

    pub fn increment_view_count(&self, id: &str) -> Result<u64> {
        self.counter.increment_view_count(id)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get_by_id(&self, id: &str) -> Result<ContentEntry> {
        self.query.get_by_id(id)
    }

    pub fn list_by_topic(&self, topic_id: &str) -> Result<Vec<ContentEntry>> {
        self.query.list_by_topic(topic_id)
    }

    pub fn list_by_course(&self, course_id: &str) -> Result<Vec<ContentEntry>> {
        self.query.list_by_course(course_id)
    }

    pub fn search(&self, query: &str) -> Result<Vec<ContentEntry>> {
        self.query.search(query)
    }

    pub fn statistics(&self, id: &str) -> Result<EntryStatistics> {
        self.query.statistics(id)
    }

    pub fn indexed_ids_for_topic(&self, topic_id: &str) -> Result<Vec<String>> {
        self.query.indexed_ids_for_topic(topic_id)
    }

    pub fn indexed_ids_for_course(&self, course_id: &str) -> Result<Vec<String>> {
        self.query.indexed_ids_for_course(course_id)
    }

    // ------------------------------------------------------------------
    // Live sync
    // ------------------------------------------------------------------

    pub fn observe_by_topic<U, E>(
        &self,
        topic_id: &str,
        on_update: U,
        on_error: E,
    ) -> Result<Subscription>
    where
        U: Fn(Vec<ContentEntry>) + Send + 'static,
        E: FnOnce(ContentError) + Send + 'static,
    {
        self.live.observe_by_topic(topic_id, on_update, on_error)
    }

    pub fn observe_by_course<U, E>(
        &self,
        course_id: &str,
        on_update: U,
        on_error: E,
    ) -> Result<Subscription>
    where
        U: Fn(Vec<ContentEntry>) + Send + 'static,
        E: FnOnce(ContentError) + Send + 'static,
    {
        self.live.observe_by_course(course_id, on_update, on_error)
    }
}
