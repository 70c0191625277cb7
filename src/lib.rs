//! Denormalized content store with secondary indices and live synchronization.
//!
//! Content entries live in a primary collection and are indexed by topic and
//! by course. The crate keeps the indices consistent across create, update,
//! soft delete and hard delete, counts views without lost updates, and streams
//! ordered snapshots of a topic or course to any number of subscribers.
//!
//! The backing store is injected as a [`BackingStore`] implementation;
//! [`InMemoryStore`] is bundled for tests and embedding.

pub mod clock;
pub mod config;
mod counter;
mod entry;
mod error;
mod index;
mod live;
mod paths;
mod query;
mod repository;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ContentConfig, LiveConfig, StoreConfig};
pub use counter::ViewCounter;
pub use entry::{
    sort_for_presentation, ContentEntry, ContentKind, ContentPatch, EntryStatistics,
    NewContentEntry,
};
pub use error::{ContentError, ErrorKind, Result};
pub use index::IndexMaintainer;
pub use live::{LiveSync, Subscription, SubscriptionState};
pub use paths::CollectionPaths;
pub use query::QueryEngine;
pub use repository::ContentRepository;
pub use store::{BackingStore, ChangeListener, InMemoryStore, ListenerId, Snapshot, StoreError};
