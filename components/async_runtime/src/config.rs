//! Runtime configuration.

use crate::error::PromiseError;
use crate::rejection::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};

/// Configuration for a microtask queue and the host event loop driving it.
///
/// Missing fields take their default values when loaded from JSON.
///
/// # Examples
///
/// ```
/// use async_runtime::RuntimeConfig;
///
/// let config = RuntimeConfig::from_json(r#"{ "max_turns": 1000 }"#).unwrap();
/// assert_eq!(config.max_turns, Some(1000));
/// assert!(config.track_rejections);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Whether rejected promises without handlers are tracked and reported
    pub track_rejections: bool,
    /// Whether the default report hook emits a `warn` log per unhandled rejection
    pub log_unhandled_rejections: bool,
    /// How many rejection events the tracker keeps before dropping the oldest
    pub rejection_history_limit: usize,
    /// Upper bound on event loop turns (`None` runs until there is no work left)
    pub max_turns: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            track_rejections: true,
            log_unhandled_rejections: true,
            rejection_history_limit: DEFAULT_HISTORY_LIMIT,
            max_turns: None,
        }
    }
}

impl RuntimeConfig {
    /// Parses a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, PromiseError> {
        serde_json::from_str(json).map_err(|e| PromiseError::Config(e.to_string()))
    }

    /// Serializes this configuration as JSON.
    pub fn to_json(&self) -> Result<String, PromiseError> {
        serde_json::to_string(self).map_err(|e| PromiseError::Config(e.to_string()))
    }
}
