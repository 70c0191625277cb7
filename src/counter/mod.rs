//! Counter Mutator - race-free view counting.
//!
//! The increment runs as a store-side atomic mutation on
//! `explanations/{id}/viewCount`; the counter never reads, adds and writes
//! back on the caller's side.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ContentError, Result};
use crate::paths::CollectionPaths;
use crate::store::{BackingStore, StoreError};

const VIEW_COUNT_FIELD: &str = "viewCount";
const ACTIVE_FIELD: &str = "active";

/// Increments per-entry view counters.
pub struct ViewCounter<S> {
    store: Arc<S>,
    paths: CollectionPaths,
}

impl<S> Clone for ViewCounter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            paths: self.paths.clone(),
        }
    }
}

impl<S: BackingStore> ViewCounter<S> {
    pub fn new(store: Arc<S>, paths: CollectionPaths) -> Self {
        Self { store, paths }
    }

    /// Record one view and return the committed count.
    ///
    /// Fails with `NotFound` when the entry has no record, and with
    /// `StoreWriteFailed` when the entry is soft-deleted, the store rejects the
    /// write or exhausts its retries. Callers typically log the failure and
    /// carry on.
    pub fn increment_view_count(&self, id: &str) -> Result<u64> {
        let path = self.paths.entry_field(id, VIEW_COUNT_FIELD);
        // A soft delete landing after this check still lets one view through.
        let active = self
            .store
            .get(&self.paths.entry_field(id, ACTIVE_FIELD))
            .map_err(|e| ContentError::write("read", e))?;
        if active == Some(Value::Bool(false)) {
            return Err(ContentError::write(
                "increment_view_count",
                StoreError::Rejected {
                    path,
                    reason: "entry is soft-deleted".into(),
                },
            ));
        }

        match self.store.atomic_increment(&path) {
            Ok(count) => {
                debug!(id, count, "view recorded");
                Ok(count.max(0) as u64)
            }
            Err(StoreError::Missing { .. }) => Err(ContentError::not_found(id)),
            Err(e) => {
                warn!(id, error = %e, "view count increment failed");
                Err(ContentError::write("increment_view_count", e))
            }
        }
    }
}
