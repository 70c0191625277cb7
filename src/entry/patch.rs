use serde_json::{Map, Value};

use super::ContentKind;

/// Partial update of an entry's display fields.
///
/// `topic_id`, `course_id`, `id`, `created_at`, `active` and `view_count` are
/// not patchable; `updated_at` is always stamped by the maintainer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub order: Option<i64>,
    pub kind: Option<ContentKind>,
    /// `Some(None)` clears the resource url.
    pub resource_url: Option<Option<String>>,
    pub estimated_duration_minutes: Option<u32>,
}

impl ContentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn kind(mut self, kind: ContentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn resource_url(mut self, url: Option<String>) -> Self {
        self.resource_url = Some(url);
        self
    }

    pub fn estimated_duration_minutes(mut self, minutes: u32) -> Self {
        self.estimated_duration_minutes = Some(minutes);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Stored field map for a merge write, with `updatedAt` stamped.
    pub(crate) fn into_fields(self, updated_at: i64) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(title) = self.title {
            fields.insert("title".into(), Value::from(title));
        }
        if let Some(body) = self.body {
            fields.insert("body".into(), Value::from(body));
        }
        if let Some(order) = self.order {
            fields.insert("order".into(), Value::from(order));
        }
        if let Some(kind) = self.kind {
            fields.insert("kind".into(), Value::from(kind.as_str()));
        }
        if let Some(url) = self.resource_url {
            fields.insert("resourceUrl".into(), url.map_or(Value::Null, Value::from));
        }
        if let Some(minutes) = self.estimated_duration_minutes {
            fields.insert("estimatedDurationMinutes".into(), Value::from(minutes));
        }
        fields.insert("updatedAt".into(), Value::from(updated_at));
        fields
    }
}
