//! Configuration for the content store.
//!
//! Configuration is layered (lowest to highest priority):
//! 1. **Compiled defaults** - [`ContentConfig::default()`]
//! 2. **JSON file** - deep-merged over the defaults, `null` values skipped
//! 3. **Environment** - `CONTENT_INDEX_*` overrides
//!
//! ```no_run
//! use std::path::Path;
//! use content_index::config::load_config_from_path;
//!
//! let config = load_config_from_path(Path::new("content-index.json")).unwrap();
//! println!("detach timeout: {:?}", config.live.detach_timeout());
//! ```

mod loader;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::CollectionPaths;
use crate::store::DEFAULT_MAX_INCREMENT_RETRIES;

pub use loader::{apply_overrides, deep_merge, load_config, load_config_from_path};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid JSON for [`ContentConfig`].
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value parsed but is unusable.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub paths: CollectionPaths,
    pub store: StoreConfig,
    pub live: LiveConfig,
}

impl ContentConfig {
    /// Reject values that would make the store unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for root in self.paths.roots() {
            if root.is_empty() || root.contains('/') {
                return Err(ConfigError::InvalidValue(format!(
                    "collection root {:?} must be a single non-empty path segment",
                    root
                )));
            }
        }
        let [entries, by_topic, by_course] = self.paths.roots();
        if entries == by_topic || entries == by_course || by_topic == by_course {
            return Err(ConfigError::InvalidValue(
                "collection roots must be distinct".into(),
            ));
        }
        if self.store.max_increment_retries == 0 {
            return Err(ConfigError::InvalidValue(
                "store.max_increment_retries must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for the bundled [`InMemoryStore`](crate::store::InMemoryStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Compare-and-swap attempts before an increment reports a conflict.
    pub max_increment_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_increment_retries: DEFAULT_MAX_INCREMENT_RETRIES,
        }
    }
}

/// Settings for live subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// How long `detach` waits for an in-flight delivery before forcing release.
    pub detach_timeout_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            detach_timeout_ms: 250,
        }
    }
}

impl LiveConfig {
    pub fn detach_timeout(&self) -> Duration {
        Duration::from_millis(self.detach_timeout_ms)
    }
}
