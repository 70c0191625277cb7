//! InMemoryStore - JSON-tree backed store for tests, development and embedding.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};

use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{BackingStore, ChangeListener, ListenerId, Snapshot, StoreError};
use crate::config::StoreConfig;

/// Default number of compare-and-swap attempts for [`BackingStore::atomic_increment`].
pub const DEFAULT_MAX_INCREMENT_RETRIES: u32 = 128;

struct Registration {
    path: String,
    listener: Arc<dyn ChangeListener>,
}

#[derive(Default)]
struct Faults {
    write_prefixes: Vec<String>,
    id_generation: bool,
}

/// Hands out delivery turns in commit order.
///
/// A ticket is drawn while the tree lock is still held; the tree lock is then
/// released and the holder waits for its turn before notifying listeners.
/// Listeners may therefore read the store from inside a callback.
#[derive(Default)]
struct Sequencer {
    issued: AtomicU64,
    turn: Mutex<u64>,
    ready: Condvar,
}

impl Sequencer {
    fn ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst)
    }

    fn wait_turn(&self, ticket: u64) -> Turn<'_> {
        let mut turn = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
        while *turn != ticket {
            turn = self
                .ready
                .wait(turn)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Turn { sequencer: self }
    }
}

/// Passes the turn on when dropped, even if a listener panics.
struct Turn<'a> {
    sequencer: &'a Sequencer,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        let mut turn = self
            .sequencer
            .turn
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *turn += 1;
        self.sequencer.ready.notify_all();
    }
}

struct Inner {
    root: RwLock<Value>,
    listeners: Mutex<BTreeMap<ListenerId, Registration>>,
    delivery: Sequencer,
    next_listener: AtomicU64,
    faults: RwLock<Faults>,
    max_increment_retries: u32,
}

/// In-memory store backed by a single JSON tree.
///
/// Features:
/// - Thread-safe (clones share the same tree via `Arc`)
/// - Compare-and-swap increments with a bounded retry budget
/// - Push change feed; listeners receive snapshots in commit order
/// - Fault injection hooks for exercising failure paths
///
/// Listeners are invoked on the writing thread after the tree lock is
/// released. They may read the store but must not write back into it from
/// inside a callback.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_max_increment_retries(DEFAULT_MAX_INCREMENT_RETRIES)
    }

    /// Create an empty store using the given configuration.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::with_max_increment_retries(config.max_increment_retries)
    }

    /// Create an empty store whose increments give up after `retries` lost races.
    pub fn with_max_increment_retries(retries: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                root: RwLock::new(Value::Object(Map::new())),
                listeners: Mutex::new(BTreeMap::new()),
                delivery: Sequencer::default(),
                next_listener: AtomicU64::new(1),
                faults: RwLock::new(Faults::default()),
                max_increment_retries: retries.max(1),
            }),
        }
    }

    /// Reject every write, delete and increment whose path starts with `prefix`.
    pub fn fail_writes_under(&self, prefix: impl Into<String>) {
        if let Ok(mut faults) = self.inner.faults.write() {
            faults.write_prefixes.push(prefix.into());
        }
    }

    /// Remove all write failures registered with [`fail_writes_under`](Self::fail_writes_under).
    pub fn clear_write_failures(&self) {
        if let Ok(mut faults) = self.inner.faults.write() {
            faults.write_prefixes.clear();
        }
    }

    /// Make [`BackingStore::generate_id`] fail while `failing` is true.
    pub fn fail_id_generation(&self, failing: bool) {
        if let Ok(mut faults) = self.inner.faults.write() {
            faults.id_generation = failing;
        }
    }

    /// Cancel every change feed, as a remote store does when it revokes access.
    ///
    /// Each listener receives `on_error` once and is dropped.
    pub fn close_listeners(&self, reason: &str) {
        let Ok(root) = self.inner.root.read() else {
            return;
        };
        let drained: Vec<Registration> = match self.inner.listeners.lock() {
            Ok(mut listeners) => std::mem::take(&mut *listeners).into_values().collect(),
            Err(_) => return,
        };
        let ticket = self.inner.delivery.ticket();
        drop(root);
        warn!(count = drained.len(), reason, "closing change feeds");

        let _turn = self.inner.delivery.wait_turn(ticket);
        for registration in drained {
            registration
                .listener
                .on_error(StoreError::ListenerClosed(reason.to_string()));
        }
    }

    /// Number of registered change listeners.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .map(|listeners| listeners.len())
            .unwrap_or(0)
    }

    fn check_writable(&self, path: &str) -> Result<(), StoreError> {
        let faults = self
            .inner
            .faults
            .read()
            .map_err(|_| StoreError::Poisoned("fault check"))?;
        if faults
            .write_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return Err(StoreError::Rejected {
                path: path.to_string(),
                reason: "write refused by store".into(),
            });
        }
        Ok(())
    }

    /// Apply `mutate` under the write lock, then hand fresh snapshots to every
    /// listener whose subtree overlaps `path`.
    fn commit<F>(&self, path: &str, operation: &'static str, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Value, &[&str]) -> Result<(), StoreError>,
    {
        self.check_writable(path)?;
        let segs = segments(path);

        let mut root = self
            .inner
            .root
            .write()
            .map_err(|_| StoreError::Poisoned(operation))?;
        mutate(&mut *root, segs.as_slice())?;
        let pending = self.affected_listeners(&root, &segs)?;
        let ticket = self.inner.delivery.ticket();
        drop(root);

        let _turn = self.inner.delivery.wait_turn(ticket);

        for (listener, snapshot) in pending {
            listener.on_change(snapshot);
        }
        Ok(())
    }

    fn affected_listeners(
        &self,
        root: &Value,
        changed: &[&str],
    ) -> Result<Vec<(Arc<dyn ChangeListener>, Snapshot)>, StoreError> {
        let listeners = self
            .inner
            .listeners
            .lock()
            .map_err(|_| StoreError::Poisoned("listeners"))?;

        Ok(listeners
            .values()
            .filter_map(|registration| {
                let watched = segments(&registration.path);
                overlaps(&watched, changed).then(|| {
                    let value = node_at(root, &watched).cloned();
                    (
                        Arc::clone(&registration.listener),
                        Snapshot::new(registration.path.clone(), value),
                    )
                })
            })
            .collect())
    }

    fn read_node(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let root = self
            .inner
            .root
            .read()
            .map_err(|_| StoreError::Poisoned("read"))?;
        Ok(node_at(&root, &segments(path)).cloned())
    }
}

impl BackingStore for InMemoryStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.read_node(path)
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        if value.is_null() {
            return self.delete(path);
        }
        self.commit(path, "set", |root, segs| {
            *node_at_mut(root, segs) = value;
            Ok(())
        })
    }

    fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.commit(path, "update", |root, segs| {
            if node_at(root, segs).is_none() {
                return Err(StoreError::Missing {
                    path: path.to_string(),
                });
            }
            let node = node_at_mut(root, segs);
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            if let Value::Object(map) = node {
                for (key, value) in fields {
                    if value.is_null() {
                        map.remove(&key);
                    } else {
                        map.insert(key, value);
                    }
                }
            }
            if node_at(root, segs).is_some_and(is_empty_object) {
                remove_at(root, segs);
            }
            Ok(())
        })
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.commit(path, "delete", |root, segs| {
            if segs.is_empty() {
                *root = Value::Object(Map::new());
            } else {
                remove_at(root, segs);
            }
            Ok(())
        })
    }

    fn generate_id(&self, parent: &str) -> Result<String, StoreError> {
        let failing = self
            .inner
            .faults
            .read()
            .map_err(|_| StoreError::Poisoned("fault check"))?
            .id_generation;
        if failing {
            return Err(StoreError::IdGeneration {
                parent: parent.to_string(),
                reason: "id service unavailable".into(),
            });
        }

        let existing = self.read_node(parent)?;
        loop {
            let id = Uuid::now_v7().simple().to_string();
            let taken = existing
                .as_ref()
                .and_then(Value::as_object)
                .is_some_and(|children| children.contains_key(&id));
            if !taken {
                return Ok(id);
            }
        }
    }

    fn atomic_increment(&self, path: &str) -> Result<i64, StoreError> {
        let segs = segments(path);
        let parent = &segs[..segs.len().saturating_sub(1)];
        let attempts = self.inner.max_increment_retries;

        for attempt in 1..=attempts {
            let observed = self.read_node(path)?;
            if !parent.is_empty() && self.read_node(&parent.join("/"))?.is_none() {
                return Err(StoreError::Missing {
                    path: parent.join("/"),
                });
            }
            let current = match &observed {
                None => 0,
                Some(value) => value.as_i64().ok_or_else(|| {
                    StoreError::Serde(format!("{} does not hold an integer", path))
                })?,
            };
            let next = current + 1;

            let mut won = false;
            self.commit(path, "increment", |root, segs| {
                if node_at(root, segs) != observed.as_ref() {
                    return Ok(());
                }
                *node_at_mut(root, segs) = Value::from(next);
                won = true;
                Ok(())
            })?;

            if won {
                return Ok(next);
            }
            debug!(path, attempt, "increment lost a race, retrying");
        }

        Err(StoreError::Conflict {
            path: path.to_string(),
            attempts,
        })
    }

    fn subscribe(
        &self,
        path: &str,
        listener: Box<dyn ChangeListener>,
    ) -> Result<ListenerId, StoreError> {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        let listener: Arc<dyn ChangeListener> = Arc::from(listener);

        let root = self
            .inner
            .root
            .read()
            .map_err(|_| StoreError::Poisoned("subscribe"))?;
        let initial = Snapshot::new(path, node_at(&root, &segments(path)).cloned());
        self.inner
            .listeners
            .lock()
            .map_err(|_| StoreError::Poisoned("listeners"))?
            .insert(
                id,
                Registration {
                    path: path.to_string(),
                    listener: Arc::clone(&listener),
                },
            );

        let ticket = self.inner.delivery.ticket();
        drop(root);

        let _turn = self.inner.delivery.wait_turn(ticket);
        debug!(path, listener = id.0, "change listener attached");
        listener.on_change(initial);
        Ok(id)
    }

    fn unsubscribe(&self, id: ListenerId) -> Result<(), StoreError> {
        let removed = self
            .inner
            .listeners
            .lock()
            .map_err(|_| StoreError::Poisoned("listeners"))?
            .remove(&id);
        if removed.is_some() {
            debug!(listener = id.0, "change listener released");
        }
        Ok(())
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// True when one path is an ancestor of (or equal to) the other.
fn overlaps(a: &[&str], b: &[&str]) -> bool {
    a.iter().zip(b).all(|(x, y)| x == y)
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(Map::is_empty)
}

fn node_at<'a>(root: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    segs.iter()
        .try_fold(root, |node, segment| node.as_object()?.get(*segment))
}

/// Walk to `segs`, creating (or replacing non-object) intermediate nodes.
fn node_at_mut<'a>(root: &'a mut Value, segs: &[&str]) -> &'a mut Value {
    let mut node = root;
    for segment in segs {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            other => other,
        };
    }
    node
}

/// Remove the node at `segs` and prune ancestors left empty. Returns whether
/// anything was removed.
fn remove_at(node: &mut Value, segs: &[&str]) -> bool {
    let Some((first, rest)) = segs.split_first() else {
        return false;
    };
    let Some(map) = node.as_object_mut() else {
        return false;
    };
    if rest.is_empty() {
        return map.remove(*first).is_some();
    }
    let removed = match map.get_mut(*first) {
        Some(child) => remove_at(child, rest),
        None => false,
    };
    if removed && map.get(*first).is_some_and(is_empty_object) {
        map.remove(*first);
    }
    removed
}
