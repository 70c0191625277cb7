//! Index Maintainer - keeps `byTopic` and `byCourse` consistent with the
//! primary store across create, update, soft delete and hard delete.
//!
//! Multi-node operations are issued as sequential writes with no compensation:
//!
//! ```text
//! create:      record ──▶ byTopic marker ──▶ byCourse marker
//! hard_delete: read record ──▶ delete record ──▶ byTopic marker ──▶ byCourse marker
//! ```
//!
//! If a later step fails the earlier ones stay applied and the caller gets
//! `StoreWriteFailed`. Readers tolerate the resulting gaps (see
//! [`QueryEngine`](crate::QueryEngine)).

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::entry::{ContentEntry, ContentPatch, NewContentEntry};
use crate::error::{ContentError, Result};
use crate::paths::CollectionPaths;
use crate::store::{BackingStore, StoreError};

/// Writes content entries and their secondary index markers.
pub struct IndexMaintainer<S> {
    store: Arc<S>,
    paths: CollectionPaths,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for IndexMaintainer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            paths: self.paths.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: BackingStore> IndexMaintainer<S> {
    pub fn new(store: Arc<S>, paths: CollectionPaths, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            paths,
            clock,
        }
    }

    /// Create an entry and index it under its topic and course.
    ///
    /// Returns the store-assigned id.
    pub fn create(&self, new: NewContentEntry) -> Result<String> {
        for (field, value) in [("topicId", &new.topic_id), ("courseId", &new.course_id)] {
            if value.is_empty() {
                return Err(ContentError::write(
                    "create",
                    StoreError::Rejected {
                        path: self.paths.entries.clone(),
                        reason: format!("{} is required", field),
                    },
                ));
            }
        }

        let id = self
            .store
            .generate_id(&self.paths.entries)
            .map_err(|e| ContentError::IdGenerationFailed(e.to_string()))?;

        let entry = ContentEntry::from_new(id.clone(), new, self.clock.now_millis());
        let record = serde_json::to_value(&entry)
            .map_err(|e| ContentError::write("create", StoreError::Serde(e.to_string())))?;

        self.store
            .set(&self.paths.entry(&id), record)
            .map_err(|e| ContentError::write("create", e))?;

        let markers = [
            self.paths.topic_marker(&entry.topic_id, &id),
            self.paths.course_marker(&entry.course_id, &id),
        ];
        for marker in &markers {
            if let Err(e) = self.store.set(marker, Value::Bool(true)) {
                warn!(
                    id = %id,
                    marker = %marker,
                    error = %e,
                    "create left entry partially indexed"
                );
                return Err(ContentError::write("create", e));
            }
        }

        debug!(
            id = %id,
            topic_id = %entry.topic_id,
            course_id = %entry.course_id,
            "content entry created"
        );
        Ok(id)
    }

    /// Merge `patch` into an active entry and stamp `updatedAt`.
    ///
    /// Soft-deleted entries are frozen; editing one is rejected.
    pub fn update(&self, id: &str, patch: ContentPatch) -> Result<()> {
        let record = self.require_record(id)?;
        if !is_active(&record) {
            return Err(ContentError::write(
                "update",
                StoreError::Rejected {
                    path: self.paths.entry(id),
                    reason: "entry is soft-deleted".into(),
                },
            ));
        }
        self.store
            .update(&self.paths.entry(id), patch.into_fields(self.clock.now_millis()))
            .map_err(|e| merge_failure("update", id, e))?;
        debug!(id, "content entry updated");
        Ok(())
    }

    /// Mark an entry inactive. Index markers are kept.
    pub fn soft_delete(&self, id: &str) -> Result<()> {
        self.require_record(id)?;
        let mut fields = serde_json::Map::new();
        fields.insert("active".into(), Value::Bool(false));
        fields.insert("updatedAt".into(), Value::from(self.clock.now_millis()));
        self.store
            .update(&self.paths.entry(id), fields)
            .map_err(|e| merge_failure("soft_delete", id, e))?;
        debug!(id, "content entry soft-deleted");
        Ok(())
    }

    /// Physically remove an entry and both of its index markers.
    pub fn hard_delete(&self, id: &str) -> Result<()> {
        let record = self.require_record(id)?;
        let topic_id = string_field(&record, "topicId");
        let course_id = string_field(&record, "courseId");

        self.store
            .delete(&self.paths.entry(id))
            .map_err(|e| ContentError::write("hard_delete", e))?;

        let mut markers = Vec::with_capacity(2);
        markers.extend(topic_id.map(|topic| self.paths.topic_marker(topic, id)));
        markers.extend(course_id.map(|course| self.paths.course_marker(course, id)));
        for marker in &markers {
            if let Err(e) = self.store.delete(marker) {
                warn!(id, marker = %marker, error = %e, "hard delete left a dangling index marker");
                return Err(ContentError::write("hard_delete", e));
            }
        }

        debug!(id, "content entry hard-deleted");
        Ok(())
    }

    fn require_record(&self, id: &str) -> Result<Value> {
        self.store
            .get(&self.paths.entry(id))
            .map_err(|e| ContentError::write("read", e))?
            .ok_or_else(|| ContentError::not_found(id))
    }
}

/// A record removed between the existence check and the merge reads as absent.
fn merge_failure(operation: &'static str, id: &str, error: StoreError) -> ContentError {
    match error {
        StoreError::Missing { .. } => ContentError::not_found(id),
        other => ContentError::write(operation, other),
    }
}

fn is_active(record: &Value) -> bool {
    record.get("active").and_then(Value::as_bool).unwrap_or(true)
}

fn string_field<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}
