//! Node layout of the primary store and its two secondary indices.
//!
//! ```text
//! explanations/{id}                         -> full ContentEntry
//! explanationsByTopic/{topicId}/{id}        -> true
//! explanationsByCourse/{courseId}/{id}      -> true
//! ```

use serde::{Deserialize, Serialize};

/// Root node names for the primary store and the two indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionPaths {
    pub entries: String,
    pub by_topic: String,
    pub by_course: String,
}

impl Default for CollectionPaths {
    fn default() -> Self {
        Self {
            entries: "explanations".into(),
            by_topic: "explanationsByTopic".into(),
            by_course: "explanationsByCourse".into(),
        }
    }
}

impl CollectionPaths {
    pub fn entry(&self, id: &str) -> String {
        format!("{}/{}", self.entries, id)
    }

    pub fn entry_field(&self, id: &str, field: &str) -> String {
        format!("{}/{}/{}", self.entries, id, field)
    }

    pub fn topic_index(&self, topic_id: &str) -> String {
        format!("{}/{}", self.by_topic, topic_id)
    }

    pub fn topic_marker(&self, topic_id: &str, id: &str) -> String {
        format!("{}/{}/{}", self.by_topic, topic_id, id)
    }

    pub fn course_index(&self, course_id: &str) -> String {
        format!("{}/{}", self.by_course, course_id)
    }

    pub fn course_marker(&self, course_id: &str, id: &str) -> String {
        format!("{}/{}/{}", self.by_course, course_id, id)
    }

    /// Every root name, for validation.
    pub(crate) fn roots(&self) -> [&str; 3] {
        [
            self.entries.as_str(),
            self.by_topic.as_str(),
            self.by_course.as_str(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let paths = CollectionPaths::default();
        assert_eq!(paths.entry("e1"), "explanations/e1");
        assert_eq!(paths.entry_field("e1", "viewCount"), "explanations/e1/viewCount");
        assert_eq!(paths.topic_marker("t1", "e1"), "explanationsByTopic/t1/e1");
        assert_eq!(paths.course_index("c1"), "explanationsByCourse/c1");
    }
}
