//! Host tracker configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// What to do with the `invalidated` list of a `PropertiesChanged` signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidatedPolicy {
    /// Keep the last known values.
    #[default]
    Ignore,
    /// Reset the named fields to their defaults.
    Clear,
    /// Pull a fresh property set from the item.
    Refetch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub invalidated_policy: InvalidatedPolicy,

    /// Timeout for property pulls, in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Host events buffered before new ones are dropped.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_event_buffer() -> usize {
    64
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            invalidated_policy: InvalidatedPolicy::default(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl HostConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, HostError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, HostError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
