//! Configuration loading with deep merge and environment overrides.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use super::{ConfigError, ContentConfig};

pub const ENV_DETACH_TIMEOUT_MS: &str = "CONTENT_INDEX_DETACH_TIMEOUT_MS";
pub const ENV_MAX_INCREMENT_RETRIES: &str = "CONTENT_INDEX_MAX_INCREMENT_RETRIES";
pub const ENV_ENTRIES_PATH: &str = "CONTENT_INDEX_ENTRIES_PATH";

/// Defaults plus environment overrides, no file.
pub fn load_config() -> Result<ContentConfig, ConfigError> {
    let mut config = ContentConfig::default();
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Load configuration from a JSON file with environment overrides.
///
/// A missing file yields the defaults; invalid JSON is an error.
pub fn load_config_from_path(path: &Path) -> Result<ContentConfig, ConfigError> {
    let defaults = serde_json::to_value(ContentConfig::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading content config from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "content config not found, using defaults");
        defaults
    };

    let mut config: ContentConfig = serde_json::from_value(merged)?;
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Recursive merge: objects merge per key, everything else is replaced by
/// `source`, and `null` in `source` keeps the target value.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides read through `lookup` (normally the process environment).
///
/// Unparseable values are logged and ignored.
pub fn apply_overrides<F>(config: &mut ContentConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = read_u64(&lookup, ENV_DETACH_TIMEOUT_MS, 1, 60_000) {
        config.live.detach_timeout_ms = v;
    }
    if let Some(v) = read_u64(&lookup, ENV_MAX_INCREMENT_RETRIES, 1, 100_000) {
        config.store.max_increment_retries = v as u32;
    }
    if let Some(v) = lookup(ENV_ENTRIES_PATH).filter(|v| !v.is_empty()) {
        config.paths.entries = v;
    }
}

fn read_u64<F>(lookup: &F, key: &str, min: u64, max: u64) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    let parsed = raw
        .parse::<u64>()
        .ok()
        .filter(|n| (min..=max).contains(n));
    if parsed.is_none() {
        warn!(key, value = %raw, "invalid numeric override, ignoring");
    }
    parsed
}
