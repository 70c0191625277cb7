//! Query/Retrieval Engine - point lookups, index-driven listings and search.
//!
//! Listings resolve index markers to primary records and hide what is not
//! currently visible: soft-deleted entries, and ids whose record is missing
//! (a create or hard delete still in progress on another thread). Neither
//! case is an error.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::entry::{sort_for_presentation, ContentEntry, EntryStatistics};
use crate::error::{ContentError, Result};
use crate::paths::CollectionPaths;
use crate::store::{BackingStore, StoreError};

/// Read-side access to content entries.
pub struct QueryEngine<S> {
    store: Arc<S>,
    paths: CollectionPaths,
}

impl<S> Clone for QueryEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            paths: self.paths.clone(),
        }
    }
}

impl<S: BackingStore> QueryEngine<S> {
    pub fn new(store: Arc<S>, paths: CollectionPaths) -> Self {
        Self { store, paths }
    }

    /// Fetch an entry whether or not it is active.
    pub fn get_by_id(&self, id: &str) -> Result<ContentEntry> {
        self.load(id)?.ok_or_else(|| ContentError::not_found(id))
    }

    /// Active entries of a topic in presentation order.
    pub fn list_by_topic(&self, topic_id: &str) -> Result<Vec<ContentEntry>> {
        let ids = self.indexed_ids(&self.paths.topic_index(topic_id))?;
        let mut entries = self.resolve_visible(&ids)?;
        sort_for_presentation(&mut entries);
        Ok(entries)
    }

    /// Active entries of a course in index order.
    pub fn list_by_course(&self, course_id: &str) -> Result<Vec<ContentEntry>> {
        let ids = self.indexed_ids(&self.paths.course_index(course_id))?;
        self.resolve_visible(&ids)
    }

    /// Active entries whose title or body contains `query`, ignoring case.
    ///
    /// Scans every primary record; meant for small corpora. An empty query
    /// matches every active entry.
    pub fn search(&self, query: &str) -> Result<Vec<ContentEntry>> {
        let needle = query.to_lowercase();
        let all = self
            .store
            .get(&self.paths.entries)
            .map_err(|e| ContentError::write("read", e))?;

        Ok(decode_collection(all.as_ref())
            .filter(|entry| entry.active && entry.mentions(&needle))
            .collect())
    }

    /// Usage figures for an entry, active or not.
    pub fn statistics(&self, id: &str) -> Result<EntryStatistics> {
        Ok(self.get_by_id(id)?.statistics())
    }

    /// Raw ids under a topic's index node, soft-deleted entries included.
    pub fn indexed_ids_for_topic(&self, topic_id: &str) -> Result<Vec<String>> {
        self.indexed_ids(&self.paths.topic_index(topic_id))
    }

    /// Raw ids under a course's index node, soft-deleted entries included.
    pub fn indexed_ids_for_course(&self, course_id: &str) -> Result<Vec<String>> {
        self.indexed_ids(&self.paths.course_index(course_id))
    }

    fn load(&self, id: &str) -> Result<Option<ContentEntry>> {
        let Some(value) = self.load_raw(id)? else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ContentError::write("read", StoreError::Serde(e.to_string())))
    }

    fn load_raw(&self, id: &str) -> Result<Option<Value>> {
        self.store
            .get(&self.paths.entry(id))
            .map_err(|e| ContentError::write("read", e))
    }

    fn indexed_ids(&self, index_path: &str) -> Result<Vec<String>> {
        let node = self
            .store
            .get(index_path)
            .map_err(|e| ContentError::write("read", e))?;
        Ok(node
            .as_ref()
            .and_then(Value::as_object)
            .map(|markers| markers.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn resolve_visible(&self, ids: &[String]) -> Result<Vec<ContentEntry>> {
        let mut visible = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(record) = self.load_raw(id)? else {
                debug!(id = %id, "indexed entry has no record yet, skipping");
                continue;
            };
            match serde_json::from_value::<ContentEntry>(record) {
                Ok(entry) if entry.active => visible.push(entry),
                Ok(_) => {}
                Err(e) => debug!(id = %id, error = %e, "skipping undecodable record"),
            }
        }
        Ok(visible)
    }
}

/// Decode every child of a collection node, skipping records that do not
/// parse.
pub(crate) fn decode_collection(node: Option<&Value>) -> impl Iterator<Item = ContentEntry> + '_ {
    node.and_then(Value::as_object)
        .into_iter()
        .flat_map(|records| records.iter())
        .filter_map(|(id, record)| match serde_json::from_value(record.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(id = %id, error = %e, "skipping undecodable record");
                None
            }
        })
}
