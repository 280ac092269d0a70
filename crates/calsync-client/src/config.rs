//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calsync/config.toml` by default.
//!
//! `[[sources]]` entries are kept untyped here. They go through the source
//! registry on every load, so one malformed entry drops only itself.

use std::path::{Path, PathBuf};

use calsync_core::{SourceBatch, SyncSettings, validate_sources};
use calsync_server::{ServerError, ServerResult, SettingsProvider};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Configuration for the calsync client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Seconds a full sync stays fresh.
    #[serde(alias = "cacheDuration", skip_serializing_if = "Option::is_none")]
    pub cache_duration: Option<u64>,

    /// Notification settings.
    pub notifications: NotificationSettings,

    /// Storage settings.
    pub storage: StorageSettings,

    /// Calendar sources, validated by the source registry.
    pub sources: Vec<toml::Value>,
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Show desktop notifications. Notices are always logged.
    pub enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding the cache timestamps and the event index.
    pub data_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        Self::parse(&content)
    }

    /// Loads configuration from `path`, or the defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, String> {
        if path.exists() {
            Self::load_from(path)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calsync")
    }

    /// Returns the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calsync")
    }

    /// Returns the configured data directory, or the default one.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Returns the raw settings as JSON, the shape the source registry reads.
    pub fn raw_settings(&self) -> ClientResult<serde_json::Value> {
        let sources = serde_json::to_value(&self.sources)
            .map_err(|e| ClientError::Config(format!("unreadable sources: {}", e)))?;
        let mut raw = serde_json::Map::new();
        raw.insert("sources".to_string(), sources);
        if let Some(secs) = self.cache_duration {
            raw.insert("cache_duration".to_string(), secs.into());
        }
        Ok(serde_json::Value::Object(raw))
    }

    /// Validates the configured sources, keeping the rejected entries.
    pub fn source_batch(&self) -> ClientResult<SourceBatch> {
        Ok(validate_sources(&self.raw_settings()?))
    }

    /// Builds the sync settings.
    pub fn sync_settings(&self) -> ClientResult<SyncSettings> {
        Ok(SyncSettings::from_config(&self.raw_settings()?))
    }
}

/// Settings read from the configuration file on every load.
#[derive(Debug, Clone)]
pub struct ConfigFileSettings {
    path: PathBuf,
}

impl ConfigFileSettings {
    /// Creates a provider reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the configuration file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsProvider for ConfigFileSettings {
    fn load(&self) -> ServerResult<SyncSettings> {
        let config = ClientConfig::load_or_default(&self.path).map_err(ServerError::config)?;
        config
            .sync_settings()
            .map_err(|e| ServerError::config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const SAMPLE: &str = r#"
cacheDuration = 600

[notifications]
enabled = false

[storage]
data_dir = "/var/lib/calsync"

[[sources]]
url = "https://example.com/work.ics"
name = "Work"
username = "me"
password = "secret"

[[sources]]
url = "file:///home/me/personal.ics"
watch = true
watch_interval = 10

[[sources]]
name = "No URL"
"#;

    #[test]
    fn empty_config_has_defaults() {
        let config = ClientConfig::parse("").unwrap();
        assert!(config.notifications.enabled);
        assert!(config.sources.is_empty());
        assert_eq!(config.cache_duration, None);

        let settings = config.sync_settings().unwrap();
        assert!(settings.sources.is_empty());
        assert_eq!(settings.cache_duration, calsync_core::DEFAULT_CACHE_DURATION);
    }

    #[test]
    fn sample_config() {
        let config = ClientConfig::parse(SAMPLE).unwrap();
        assert!(!config.notifications.enabled);
        assert_eq!(config.data_dir(), PathBuf::from("/var/lib/calsync"));

        let settings = config.sync_settings().unwrap();
        assert_eq!(settings.cache_duration, Duration::from_secs(600));
        assert_eq!(settings.sources.len(), 2);
        assert_eq!(settings.sources[0].name.as_deref(), Some("Work"));
        assert_eq!(settings.sources[0].credentials(), Some(("me", "secret")));
        assert!(settings.sources[1].is_watched());
        assert_eq!(settings.min_watch_interval(), Some(Duration::from_secs(10)));

        let batch = config.source_batch().unwrap();
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].index, 2);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let err = ClientConfig::parse("sources = 3 = 4").unwrap_err();
        assert!(err.starts_with("failed to parse config"));
    }

    #[test]
    fn file_settings_reread_on_every_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let provider = ConfigFileSettings::new(&path);

        // A missing file is an empty source list.
        assert!(provider.load().unwrap().sources.is_empty());

        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(provider.load().unwrap().sources.len(), 2);

        std::fs::write(&path, "[[sources]]\nurl = \"file:///tmp/a.ics\"\n").unwrap();
        assert_eq!(provider.load().unwrap().sources.len(), 1);
    }

    #[test]
    fn broken_file_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[sources]\n").unwrap();

        let err = ConfigFileSettings::new(&path).load().unwrap_err();
        assert!(matches!(err, ServerError::Config { .. }));
    }
}
