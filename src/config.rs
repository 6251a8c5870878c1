//! Workspace configuration, read from `.dx/tags/config.toml`.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::state_dir;

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagsConfig {
    /// Show colored badges on tagged explorer entries.
    pub decorations_enabled: bool,

    /// Delay before a coalesced view refresh fires.
    pub refresh_debounce_ms: u64,

    /// How long a host-handled path shadows watcher events for the same path.
    pub suppression_window_ms: u64,

    /// How long the filesystem watcher holds raw events before delivering
    /// them. Keep it well below `suppression_window_ms`: a watcher echo of a
    /// host operation must arrive while that operation is still suppressed.
    pub watch_debounce_ms: u64,

    /// Persistence write attempts before a save is given up.
    pub save_attempts: u32,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub level: String,

    /// Write a daily rolling log file here as well as to stderr.
    pub directory: Option<PathBuf>,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            decorations_enabled: true,
            refresh_debounce_ms: 100,
            suppression_window_ms: 200,
            watch_debounce_ms: 50,
            save_attempts: 3,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl TagsConfig {
    pub fn path(workspace: &Path) -> PathBuf {
        state_dir(workspace).join(CONFIG_FILE)
    }

    /// Load the workspace config; a missing file yields the defaults.
    pub fn load(workspace: &Path) -> Result<Self> {
        let path = Self::path(workspace);
        match std::fs::read_to_string(&path) {
            Ok(raw) => Self::from_toml(&raw)
                .with_context(|| format!("Invalid config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }

    pub fn suppression_window(&self) -> Duration {
        Duration::from_millis(self.suppression_window_ms)
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = TagsConfig::load(temp_dir.path()).unwrap();

        assert_eq!(config, TagsConfig::default());
        assert_eq!(config.refresh_delay(), Duration::from_millis(100));
        assert_eq!(config.suppression_window(), Duration::from_millis(200));
        assert_eq!(config.watch_debounce(), Duration::from_millis(50));
    }

    #[test]
    fn test_partial_file_overrides() {
        let config = TagsConfig::from_toml(
            r#"
decorations_enabled = false
suppression_window_ms = 500

[logging]
level = "debug"
"#,
        )
        .unwrap();

        assert!(!config.decorations_enabled);
        assert_eq!(config.suppression_window_ms, 500);
        assert_eq!(config.refresh_debounce_ms, 100);
        assert_eq!(config.watch_debounce_ms, 50);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = TagsConfig::path(temp_dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "refresh_debounce_ms = \"soon\"").unwrap();

        assert!(TagsConfig::load(temp_dir.path()).is_err());
    }

    #[test]
    fn test_watch_debounce_is_independent_of_refresh_delay() {
        let config = TagsConfig::from_toml("refresh_debounce_ms = 400\nwatch_debounce_ms = 20").unwrap();

        assert_eq!(config.refresh_delay(), Duration::from_millis(400));
        assert_eq!(config.watch_debounce(), Duration::from_millis(20));
        assert!(TagsConfig::default().watch_debounce() < TagsConfig::default().suppression_window());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = TagsConfig::default();
        let raw = config.to_toml().unwrap();
        assert_eq!(TagsConfig::from_toml(&raw).unwrap(), config);
    }
}
