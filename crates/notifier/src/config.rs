//! Publisher configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trayline_protocol::{Category, Status};

use crate::error::NotifierError;

/// Initial item properties and transport settings for a [`Publisher`].
///
/// [`Publisher`]: crate::Publisher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Numeric item id, part of the bus name `org.kde.StatusNotifierItem-<pid>-<id>`.
    #[serde(default = "default_id")]
    pub id: u32,

    /// Title shown by the shell.
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub category: Category,

    #[serde(default)]
    pub status: Status,

    #[serde(default)]
    pub icon_theme_path: String,

    /// The item only offers a menu; shells open it on primary click.
    #[serde(default = "default_true")]
    pub item_is_menu: bool,

    /// Timeout for calls to the watcher, in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_id() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_call_timeout_ms() -> u64 {
    5_000
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            id: default_id(),
            title: String::new(),
            category: Category::default(),
            status: Status::default(),
            icon_theme_path: String::new(),
            item_is_menu: default_true(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl NotifierConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, NotifierError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, NotifierError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = NotifierConfig::default();
        assert_eq!(config.id, 1);
        assert_eq!(config.category, Category::ApplicationStatus);
        assert_eq!(config.status, Status::Active);
        assert!(config.item_is_menu);
        assert_eq!(config.call_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn empty_toml_uses_defaults() {
        assert_eq!(NotifierConfig::from_toml_str("").unwrap(), NotifierConfig::default());
    }

    #[test]
    fn partial_toml() {
        let config = NotifierConfig::from_toml_str(
            r#"
            title = "Mail"
            category = "Communications"
            status = "NeedsAttention"
            "#,
        )
        .unwrap();
        assert_eq!(config.title, "Mail");
        assert_eq!(config.category, Category::Communications);
        assert_eq!(config.status, Status::NeedsAttention);
        assert_eq!(config.id, 1);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let err = NotifierConfig::from_toml_str("status = \"Sleeping\"").unwrap_err();
        assert!(matches!(err, NotifierError::Config(_)));
    }

    #[test]
    fn serializes_back() {
        let config = NotifierConfig {
            title: "App".into(),
            ..NotifierConfig::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(NotifierConfig::from_toml_str(&text).unwrap(), config);
    }
}
