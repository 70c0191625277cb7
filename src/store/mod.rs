//! Backing Store - the opaque key/value tree every component talks to.
//!
//! The store is addressed by slash-separated paths (`"explanations/e-1/title"`).
//! Values are JSON trees; an object node's keys are its children.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            IndexMaintainer / QueryEngine / ...           │
//! └──────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                  BackingStore trait                      │
//! │  get / set / update / delete / generate_id               │
//! │  atomic_increment / subscribe / unsubscribe              │
//! └──────────────────────────────────────────────────────────┘
//!          │                                   │
//!          ▼                                   ▼
//! ┌─────────────────┐              ┌──────────────────────────┐
//! │  InMemoryStore  │              │ Realtime DB / KV adapter │
//! │   (included)    │              │       (external)         │
//! └─────────────────┘              └──────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use content_index::store::{BackingStore, InMemoryStore};
//! use serde_json::json;
//!
//! let store = InMemoryStore::new();
//! store.set("courses/c-1", json!({"title": "Algebra"})).unwrap();
//! assert_eq!(store.atomic_increment("courses/c-1/views").unwrap(), 1);
//! assert_eq!(store.get("courses/c-1/title").unwrap(), Some(json!("Algebra")));
//! ```

mod in_memory;

use serde_json::{Map, Value};
use thiserror::Error;

pub use in_memory::{InMemoryStore, DEFAULT_MAX_INCREMENT_RETRIES};

/// Error type for backing store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The addressed node (or the record that should contain it) does not exist.
    #[error("no node at {path}")]
    Missing { path: String },
    /// The store refused the write.
    #[error("write to {path} rejected: {reason}")]
    Rejected { path: String, reason: String },
    /// An atomic mutation kept losing to concurrent writers until its retry
    /// budget ran out.
    #[error("atomic update of {path} gave up after {attempts} attempts")]
    Conflict { path: String, attempts: u32 },
    /// No id could be minted under the parent.
    #[error("could not generate id under {parent}: {reason}")]
    IdGeneration { parent: String, reason: String },
    /// An internal lock was poisoned.
    #[error("store lock poisoned during {0}")]
    Poisoned(&'static str),
    /// A node could not be converted to or from its typed form.
    #[error("store serialization error: {0}")]
    Serde(String),
    /// The change feed was cancelled by the store.
    #[error("change feed closed: {0}")]
    ListenerClosed(String),
}

/// Opaque handle for a registered change listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// The value found at a path at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: String,
    pub value: Option<Value>,
}

impl Snapshot {
    pub fn new(path: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }

    /// Whether anything exists at the path.
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    /// Child nodes keyed by their last path segment. Empty for leaves and
    /// missing nodes.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.value
            .as_ref()
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|map| map.iter().map(|(key, value)| (key.as_str(), value)))
    }
}

/// Receives change notifications for one subscribed path.
///
/// `on_change` carries the full current value at the subscribed path, never a
/// diff. After `on_error` the store delivers nothing further to this listener.
///
/// Callbacks may read the store. Writing back into it from a callback is not
/// supported.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, snapshot: Snapshot);

    fn on_error(&self, error: StoreError);
}

/// Abstract key/value tree with atomic increments and change notification.
///
/// Implementations must be safe to share across threads. Each call is a
/// blocking suspension point for the calling thread.
pub trait BackingStore: Send + Sync {
    /// Read the node at `path`. Returns `None` if nothing is stored there.
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the node at `path`, creating parents as needed.
    fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Merge `fields` into the object at `path`. Fields set to `null` are removed.
    ///
    /// Fails with [`StoreError::Missing`] when nothing is stored at `path`; an
    /// update never creates a node.
    fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Remove the node at `path`. Removing a missing node succeeds.
    fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Mint an id that is unused under `parent` and will never be handed out again.
    fn generate_id(&self, parent: &str) -> Result<String, StoreError>;

    /// Add one to the integer at `path` and return the new value.
    ///
    /// Conflicting concurrent writers are retried internally; the caller only
    /// sees the committed value or a permanent failure.
    fn atomic_increment(&self, path: &str) -> Result<i64, StoreError>;

    /// Register `listener` for changes at or below `path`.
    ///
    /// The listener receives the current value right away, then a fresh
    /// snapshot after every change that touches the subscribed subtree.
    fn subscribe(
        &self,
        path: &str,
        listener: Box<dyn ChangeListener>,
    ) -> Result<ListenerId, StoreError>;

    /// Release a listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: ListenerId) -> Result<(), StoreError>;
}
