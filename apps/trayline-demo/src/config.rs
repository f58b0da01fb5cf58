//! Demo configuration, stored as TOML at `~/.config/trayline/demo.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trayline_host::HostConfig;
use trayline_notifier::NotifierConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bus to join instead of the session bus, e.g. `unix:path=/run/user/1000/bus`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_address: Option<String>,

    /// PNG or ICO file used as the tray icon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<PathBuf>,

    /// Play the shell's part: click the menu entries after startup.
    #[serde(default)]
    pub simulate_clicks: bool,

    #[serde(default = "default_notifier")]
    pub notifier: NotifierConfig,

    #[serde(default)]
    pub host: HostConfig,
}

fn default_notifier() -> NotifierConfig {
    NotifierConfig {
        title: "Trayline".into(),
        ..NotifierConfig::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus_address: None,
            icon_path: None,
            simulate_clicks: false,
            notifier: default_notifier(),
            host: HostConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home)
        .join(".config")
        .join("trayline")
        .join("demo.toml")
}
