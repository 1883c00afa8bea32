//! Application configuration.
//!
//! Stored as JSON at `<config_dir>/revibe/config.json`. A missing file
//! yields defaults; a few fields can be overridden from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::items::DEFAULT_RECENT_LIMIT;
use crate::{Error, Result};

/// Environment variable overriding [`Config::auth_url`].
pub const ENV_AUTH_URL: &str = "REVIBE_AUTH_URL";
/// Environment variable overriding [`Config::auth_key`].
pub const ENV_AUTH_KEY: &str = "REVIBE_AUTH_KEY";
/// Environment variable overriding [`Config::database_path`].
pub const ENV_DATABASE: &str = "REVIBE_DATABASE";

const APP_DIR: &str = "revibe";
const CONFIG_FILE: &str = "config.json";
const DATABASE_FILE: &str = "revibe.db";

/// Where the session cache keeps its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// System keyring.
    Keyring,
    /// One file per key under [`Config::cache_dir`].
    #[default]
    File,
    /// Process memory; nothing survives a restart.
    Memory,
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the remote authority. `None` runs offline.
    pub auth_url: Option<String>,
    /// Public API key sent with every auth request.
    pub auth_key: Option<String>,
    /// Item database path; defaults under the data directory.
    pub database_path: Option<PathBuf>,
    /// Session cache backend.
    pub cache_backend: CacheBackend,
    /// Directory for the file cache backend.
    pub cache_dir: Option<PathBuf>,
    /// Drop and recreate the item table on every start.
    pub reset_items_on_start: bool,
    /// Default number of items returned by recent-item queries.
    pub recent_limit: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_url: None,
            auth_key: None,
            database_path: None,
            cache_backend: CacheBackend::default(),
            cache_dir: None,
            reset_items_on_start: false,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

impl Config {
    /// Default location of the config file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(CONFIG_FILE)
    }

    /// Loads the config from [`Config::default_path`] and applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::default_path()).await?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Loads the config from `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Writes the config to [`Config::default_path`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()).await
    }

    /// Writes the config to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        info!("Config saved to {}", path.display());
        Ok(())
    }

    /// Applies overrides looked up by `lookup` (normally the process
    /// environment). Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = lookup(ENV_AUTH_URL) {
            self.auth_url = Some(url);
        }
        if let Some(key) = lookup(ENV_AUTH_KEY) {
            self.auth_key = Some(key);
        }
        if let Some(path) = lookup(ENV_DATABASE) {
            self.database_path = Some(PathBuf::from(path));
        }
    }

    /// Item database path, falling back to `<data_dir>/revibe/revibe.db`.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| data_dir().join(DATABASE_FILE))
    }

    /// File cache directory, falling back to `<data_dir>/revibe/cache`.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("cache"))
    }

    /// Remote authority URL and key, if both are configured.
    #[must_use]
    pub fn remote(&self) -> Option<(&str, &str)> {
        match (self.auth_url.as_deref(), self.auth_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_backend, CacheBackend::File);
        assert_eq!(config.recent_limit, 4);
        assert!(!config.reset_items_on_start);
        assert!(config.remote().is_none());
        assert!(config.database_path().ends_with("revibe/revibe.db"));
        assert!(config.cache_dir().ends_with("revibe/cache"));
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");

        let config = Config {
            auth_url: Some("https://auth.example.com".into()),
            auth_key: Some("anon".into()),
            cache_backend: CacheBackend::Keyring,
            recent_limit: 10,
            ..Config::default()
        };
        config.save_to(&path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"cache_backend\": \"keyring\""));

        let loaded = Config::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.remote(),
            Some(("https://auth.example.com", "anon"))
        );
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"cache_backend":"memory"}"#).unwrap();

        let config = Config::load_from(&path).await.unwrap();
        assert_eq!(config.cache_backend, CacheBackend::Memory);
        assert_eq!(config.recent_limit, DEFAULT_RECENT_LIMIT);
    }

    #[tokio::test]
    async fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{").unwrap();

        let err = Config::load_from(&path).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_AUTH_URL, "http://localhost:9999"),
            (ENV_AUTH_KEY, "  "),
            (ENV_DATABASE, "/tmp/items.db"),
        ]
        .into_iter()
        .collect();

        let mut config = Config {
            auth_key: Some("kept".into()),
            ..Config::default()
        };
        config.apply_overrides(|name| env.get(name).map(ToString::to_string));

        assert_eq!(config.auth_url.as_deref(), Some("http://localhost:9999"));
        assert_eq!(config.auth_key.as_deref(), Some("kept"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/items.db"));
    }
}
