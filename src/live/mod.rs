//! Live Sync - streams filtered, ordered snapshots of the primary store to
//! subscribers.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐  on_change / on_error   ┌────────────────┐
//! │ BackingStore  │ ──────────────────────▶ │  FeedListener  │
//! │ (whole entry  │                         │  (mpsc sender) │
//! │  collection)  │                         └────────────────┘
//! └───────────────┘                                 │
//!                                                   ▼
//!                                  ┌────────────────────────────────┐
//!                                  │ dispatcher thread              │
//!                                  │ - coalesce to newest snapshot  │
//!                                  │ - filter (topic/course, active)│
//!                                  │ - sort (order, createdAt, id)  │
//!                                  │ - on_update / on_error         │
//!                                  └────────────────────────────────┘
//! ```
//!
//! Each subscription moves `Unattached -> Attached -> Detached`. `Detached`
//! is terminal: it is reached by [`Subscription::detach`], by dropping the
//! handle, or after `on_error` fires. No `on_update` starts once a
//! subscription is detached.
//!
//! ## Example
//!
//! ```ignore
//! let subscription = live.observe_by_topic(
//!     "t1",
//!     |entries| println!("{} entries", entries.len()),
//!     |err| eprintln!("feed lost: {}", err),
//! )?;
//! // ...
//! subscription.detach();
//! ```

mod subscription;

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::entry::{sort_for_presentation, ContentEntry};
use crate::error::{ContentError, Result};
use crate::paths::CollectionPaths;
use crate::query::decode_collection;
use crate::store::{BackingStore, ChangeListener, Snapshot, StoreError};

pub use subscription::{Subscription, SubscriptionState};

use subscription::Shared;

/// How often an idle dispatcher re-checks whether it has been detached.
const IDLE_CHECK: Duration = Duration::from_millis(100);

/// Which entries a subscription delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Topic(String),
    Course(String),
}

impl Scope {
    fn admits(&self, entry: &ContentEntry) -> bool {
        entry.active
            && match self {
                Scope::Topic(topic_id) => entry.topic_id == *topic_id,
                Scope::Course(course_id) => entry.course_id == *course_id,
            }
    }

    fn select(&self, snapshot: &Snapshot) -> Vec<ContentEntry> {
        let mut entries: Vec<ContentEntry> = decode_collection(snapshot.value.as_ref())
            .filter(|entry| self.admits(entry))
            .collect();
        sort_for_presentation(&mut entries);
        entries
    }
}

enum Feed {
    Changed(Snapshot),
    Failed(StoreError),
}

/// Bridges the store's callback interface onto the dispatcher channel.
struct FeedListener {
    tx: Mutex<Sender<Feed>>,
}

impl FeedListener {
    fn send(&self, feed: Feed) {
        if let Ok(tx) = self.tx.lock() {
            // The dispatcher may already be gone after a detach.
            let _ = tx.send(feed);
        }
    }
}

impl ChangeListener for FeedListener {
    fn on_change(&self, snapshot: Snapshot) {
        self.send(Feed::Changed(snapshot));
    }

    fn on_error(&self, error: StoreError) {
        self.send(Feed::Failed(error));
    }
}

/// Fan-out of live entry snapshots.
pub struct LiveSync<S> {
    store: Arc<S>,
    paths: CollectionPaths,
    detach_timeout: Duration,
}

impl<S> Clone for LiveSync<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            paths: self.paths.clone(),
            detach_timeout: self.detach_timeout,
        }
    }
}

impl<S: BackingStore + 'static> LiveSync<S> {
    pub fn new(store: Arc<S>, paths: CollectionPaths, detach_timeout: Duration) -> Self {
        Self {
            store,
            paths,
            detach_timeout,
        }
    }

    /// Stream the active entries of `topic_id`, ordered by `order`.
    ///
    /// `on_update` receives the complete current list after attach and after
    /// every change to the collection. `on_error` fires at most once, when the
    /// change feed fails; the subscription is detached afterwards.
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
        self.observe(Scope::Topic(topic_id.to_string()), on_update, on_error)
    }

    /// Stream the active entries of `course_id`. Same contract as
    /// [`observe_by_topic`](Self::observe_by_topic).
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
        self.observe(Scope::Course(course_id.to_string()), on_update, on_error)
    }

    fn observe<U, E>(&self, scope: Scope, on_update: U, on_error: E) -> Result<Subscription>
    where
        U: Fn(Vec<ContentEntry>) + Send + 'static,
        E: FnOnce(ContentError) + Send + 'static,
    {
        let shared = Arc::new(Shared::new());
        let (tx, rx) = channel();

        let listener_id = self
            .store
            .subscribe(
                &self.paths.entries,
                Box::new(FeedListener {
                    tx: Mutex::new(tx),
                }),
            )
            .map_err(|e| ContentError::ListenerError(e.to_string()))?;

        let store = Arc::clone(&self.store);
        shared.attach(Box::new(move || {
            if let Err(e) = store.unsubscribe(listener_id) {
                warn!(listener = listener_id.0, error = %e, "failed to release change listener");
            }
        }));
        debug!(?scope, listener = listener_id.0, "live subscription attached");

        let dispatcher = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("content-live-sync".into())
            .spawn(move || dispatch(rx, scope, dispatcher, on_update, on_error));
        match handle {
            Ok(handle) => shared.set_dispatcher(handle.thread().id()),
            Err(e) => {
                shared.release();
                return Err(ContentError::ListenerError(format!(
                    "could not start dispatcher: {}",
                    e
                )));
            }
        }

        Ok(Subscription::new(shared, self.detach_timeout))
    }
}

fn dispatch<U, E>(rx: Receiver<Feed>, scope: Scope, shared: Arc<Shared>, on_update: U, on_error: E)
where
    U: Fn(Vec<ContentEntry>),
    E: FnOnce(ContentError),
{
    let mut on_error = Some(on_error);
    loop {
        let feed = match rx.recv_timeout(IDLE_CHECK) {
            Ok(feed) => coalesce(feed, &rx),
            Err(RecvTimeoutError::Timeout) => {
                if shared.is_detached() {
                    break;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match feed {
            Feed::Changed(snapshot) => {
                let entries = scope.select(&snapshot);
                if !shared.begin_delivery() {
                    break;
                }
                on_update(entries);
                shared.end_delivery();
            }
            Feed::Failed(error) => {
                if shared.fail() {
                    warn!(?scope, error = %error, "live subscription lost its change feed");
                    shared.release();
                    if let Some(on_error) = on_error.take() {
                        on_error(ContentError::ListenerError(error.to_string()));
                    }
                }
                break;
            }
        }
    }
    debug!(?scope, "live dispatcher stopped");
}

/// Skip snapshots superseded by newer ones already queued. A failure is never
/// skipped.
fn coalesce(mut feed: Feed, rx: &Receiver<Feed>) -> Feed {
    while matches!(feed, Feed::Changed(_)) {
        match rx.try_recv() {
            Ok(newer) => feed = newer,
            Err(_) => break,
        }
    }
    feed
}
