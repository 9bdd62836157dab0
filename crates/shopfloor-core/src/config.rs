//! Configuration for the backend, synchronization behaviour and logging.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "SHOPFLOOR_API_KEY";

/// Complete configuration.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopfloorConfig {
    /// Persistence backend selection
    #[serde(default)]
    pub backend: BackendConfig,
    /// Optimistic synchronization settings
    #[serde(default)]
    pub sync: SyncConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which remote store implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process store, optionally seeded from a JSON file
    #[default]
    Memory,
    /// REST backend over HTTP
    Http,
}

/// Backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend implementation
    pub kind: BackendKind,
    /// Base URL of the REST backend
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Bearer token for the REST backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// JSON file with jobs to preload into the in-memory backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_path: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            base_url: "http://localhost:8080/api".to_owned(),
            timeout_seconds: 30,
            api_key: None,
            seed_path: None,
        }
    }
}

/// When the reconciliation fetch after a mutation runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// Spawned on the runtime; the mutation returns without waiting for it
    #[default]
    Background,
    /// Awaited before the mutation returns
    Inline,
}

/// Synchronization configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How reconciliation fetches are scheduled
    pub reconcile: ReconcileMode,
    /// Whether cached list views are re-fetched on settle
    pub refresh_lists: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconcile: ReconcileMode::Background,
            refresh_lists: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is not set
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

impl ShopfloorConfig {
    /// Load config from `path` when given and present, defaults otherwise.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load_from_file(path),
            Some(path) => {
                tracing::debug!("Config file {:?} not found, using defaults", path);
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("Failed to read config: {error}")))?;
        let config: Self = toml::from_str(&contents)?;

        tracing::debug!(
            "Loaded config from {:?}: backend={:?}, reconcile={:?}, api_key={}",
            path,
            config.backend.kind,
            config.sync.reconcile,
            if config.backend.api_key.is_some() {
                "present"
            } else {
                "missing"
            }
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!("Failed to create config directory: {error}"))
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# Shopfloor Configuration File\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))
            .map_err(|error| Error::Config(format!("Failed to write config: {error}")))?;

        Ok(())
    }

    /// API key for the HTTP backend, checking config first, then the environment
    pub fn api_key(&self) -> Option<String> {
        self.backend
            .api_key
            .clone()
            .or_else(|| env::var(API_KEY_ENV).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = ShopfloorConfig::default();
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(config.backend.timeout_seconds, 30);
        assert_eq!(config.sync.reconcile, ReconcileMode::Background);
        assert!(config.sync.refresh_lists);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_load_partial_toml_fills_defaults() {
        let toml_content = r#"
[backend]
kind = "http"
base_url = "https://shop.example.com/api"
timeout_seconds = 10
api_key = "secret-123"

[sync]
reconcile = "inline"
refresh_lists = false
"#;

        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        temp_file
            .write_all(toml_content.as_bytes())
            .expect("Failed to write to temp file");

        let config = ShopfloorConfig::load_from_file(temp_file.path())
            .expect("Failed to load config from temp file");

        assert_eq!(config.backend.kind, BackendKind::Http);
        assert_eq!(config.backend.base_url, "https://shop.example.com/api");
        assert_eq!(config.api_key(), Some("secret-123".to_owned()));
        assert_eq!(config.sync.reconcile, ReconcileMode::Inline);
        assert!(!config.sync.refresh_lists);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("nested").join("shopfloor.toml");

        let mut config = ShopfloorConfig::default();
        config.logging.filter = "shopfloor_sync=debug".to_owned();
        config.save_to_file(&path).expect("save config");

        let loaded = ShopfloorConfig::load_from_file(&path).expect("load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("absent.toml");
        let config = ShopfloorConfig::load_or_default(Some(&path)).expect("defaults");
        assert_eq!(config, ShopfloorConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        temp_file
            .write_all(b"[backend\nkind = ")
            .expect("Failed to write to temp file");
        let error = ShopfloorConfig::load_from_file(temp_file.path()).unwrap_err();
        assert!(matches!(error, Error::Toml(_)));
    }
}
