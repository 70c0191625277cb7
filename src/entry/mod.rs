//! Content entries - the records the primary store holds.
//!
//! A [`ContentEntry`] belongs to exactly one topic and one course for its whole
//! life. Soft-deleted entries (`active == false`) stay in storage, keep their
//! index markers, and are hidden from every listing, search and live delivery.

mod patch;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub use patch::ContentPatch;

/// Presentation kind of a content entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Text,
    Video,
    Image,
    Audio,
    Document,
    Link,
    /// Any kind this build does not know about.
    #[serde(other)]
    Other,
}

impl ContentKind {
    /// Stored name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Video => "video",
            ContentKind::Image => "image",
            ContentKind::Audio => "audio",
            ContentKind::Document => "document",
            ContentKind::Link => "link",
            ContentKind::Other => "other",
        }
    }
}

fn default_active() -> bool {
    true
}

/// A single piece of topic-attached instructional content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntry {
    pub id: String,
    pub topic_id: String,
    pub course_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_url: Option<String>,
    #[serde(default)]
    pub estimated_duration_minutes: u32,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub view_count: u64,
}

impl ContentEntry {
    /// Materialize a new record from creation input.
    pub fn from_new(id: impl Into<String>, new: NewContentEntry, now: i64) -> Self {
        Self {
            id: id.into(),
            topic_id: new.topic_id,
            course_id: new.course_id,
            title: new.title,
            body: new.body,
            order: new.order,
            kind: new.kind,
            resource_url: new.resource_url,
            estimated_duration_minutes: new.estimated_duration_minutes,
            created_at: now,
            updated_at: now,
            active: true,
            view_count: 0,
        }
    }

    /// Case-insensitive substring match on title or body. `needle` must
    /// already be lowercase.
    pub(crate) fn mentions(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle) || self.body.to_lowercase().contains(needle)
    }

    pub fn statistics(&self) -> EntryStatistics {
        EntryStatistics {
            view_count: self.view_count,
            estimated_duration_minutes: self.estimated_duration_minutes,
            created_at: self.created_at,
            updated_at: self.updated_at,
            kind: self.kind,
        }
    }

    /// Presentation order: `order`, then creation time, then id.
    pub fn presentation_cmp(&self, other: &Self) -> Ordering {
        self.order
            .cmp(&other.order)
            .then(self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Sort entries into presentation order.
pub fn sort_for_presentation(entries: &mut [ContentEntry]) {
    entries.sort_by(ContentEntry::presentation_cmp);
}

/// Input for creating a content entry. The store assigns the id and
/// timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContentEntry {
    pub topic_id: String,
    pub course_id: String,
    pub title: String,
    pub body: String,
    pub order: i64,
    pub kind: ContentKind,
    pub resource_url: Option<String>,
    pub estimated_duration_minutes: u32,
}

impl NewContentEntry {
    pub fn new(topic_id: impl Into<String>, course_id: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            course_id: course_id.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn with_kind(mut self, kind: ContentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_resource_url(mut self, url: impl Into<String>) -> Self {
        self.resource_url = Some(url.into());
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.estimated_duration_minutes = minutes;
        self
    }
}

/// Read-only usage figures for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryStatistics {
    pub view_count: u64,
    pub estimated_duration_minutes: u32,
    pub created_at: i64,
    pub updated_at: i64,
    pub kind: ContentKind,
}
