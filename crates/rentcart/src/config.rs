//! Rentcart configuration parsing
//!
//! Reads settings from `~/.rentcart/rentcart.toml`. Every field has a
//! default, so a missing or empty file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::booking::SubmitterConfig;
use crate::error::ConfigError;
use rentcart_store::StoreConfig;

/// Result type for config operations
pub type Result<T> = std::result::Result<T, ConfigError>;

const CONFIG_FILE: &str = "rentcart.toml";
const API_URL_ENV: &str = "RENTCART_API_URL";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RentcartConfig {
    /// Base URL of the rental REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Deadline for each availability lookup (seconds)
    #[serde(default = "default_availability_timeout")]
    pub availability_timeout_secs: u64,

    /// Deadline for the batch booking call (seconds)
    #[serde(default = "default_submission_timeout")]
    pub submission_timeout_secs: u64,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl Default for RentcartConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            availability_timeout_secs: default_availability_timeout(),
            submission_timeout_secs: default_submission_timeout(),
            storage: StorageSettings::default(),
        }
    }
}

/// `[storage]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageSettings {
    /// Key prefix shared by all selection records
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Ceiling for one record, and the reference for usage reporting
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: usize,

    /// Deflate records that would exceed the ceiling
    #[serde(default)]
    pub compress: bool,

    /// Directory for selection records; defaults to `<home>/selections`
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            max_size_bytes: default_max_size_bytes(),
            compress: false,
            dir: None,
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_availability_timeout() -> u64 {
    10
}

fn default_submission_timeout() -> u64 {
    30
}

fn default_prefix() -> String {
    "rentcart".to_string()
}

fn default_max_size_bytes() -> usize {
    5 * 1024 * 1024
}

impl RentcartConfig {
    /// Load configuration from a file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: RentcartConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `<home>/rentcart.toml`, then apply `RENTCART_API_URL`.
    pub fn load_default() -> Result<Self> {
        let mut config = Self::load(&Self::default_path())?;
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api_base_url = url;
            }
        }
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        rentcart_logging::rentcart_home().join(CONFIG_FILE)
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.storage
            .dir
            .clone()
            .unwrap_or_else(|| rentcart_logging::rentcart_home().join("selections"))
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            prefix: self.storage.prefix.clone(),
            max_size_bytes: self.storage.max_size_bytes,
            compress: self.storage.compress,
        }
    }

    pub fn submitter_config(&self) -> SubmitterConfig {
        SubmitterConfig {
            availability_timeout: Duration::from_secs(self.availability_timeout_secs),
            submission_timeout: Duration::from_secs(self.submission_timeout_secs),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.availability_timeout_secs == 0 || self.submission_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least 1 second".to_string()));
        }
        if self.storage.max_size_bytes == 0 {
            return Err(ConfigError::Invalid("storage.max_size_bytes must be positive".to_string()));
        }
        let prefix = &self.storage.prefix;
        if prefix.is_empty() || prefix.contains('_') {
            return Err(ConfigError::Invalid(format!(
                "storage.prefix '{}' must be non-empty and contain no '_'",
                prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = RentcartConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.submitter_config(), SubmitterConfig::default());
        assert_eq!(config.store_config().prefix, "rentcart");
        assert!(!config.storage.compress);
    }

    #[test]
    fn test_missing_and_empty_files_use_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        assert_eq!(RentcartConfig::load(&path).unwrap(), RentcartConfig::default());

        std::fs::write(&path, "").unwrap();
        assert_eq!(RentcartConfig::load(&path).unwrap(), RentcartConfig::default());
    }

    #[test]
    fn test_load_partial_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
api_base_url = "https://rentals.example.com"
submission_timeout_secs = 90

[storage]
compress = true
dir = "/var/lib/rentcart"
"#,
        )
        .unwrap();

        let config = RentcartConfig::load(&path).unwrap();
        assert_eq!(config.api_base_url, "https://rentals.example.com");
        assert_eq!(config.availability_timeout_secs, 10);
        assert_eq!(config.submitter_config().submission_timeout, Duration::from_secs(90));
        assert!(config.storage.compress);
        assert_eq!(config.storage_dir(), PathBuf::from("/var/lib/rentcart"));
        assert_eq!(config.storage.max_size_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);

        std::fs::write(&path, "availability_timeout_secs = 0").unwrap();
        assert!(matches!(RentcartConfig::load(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, "[storage]\nprefix = \"my_cart\"").unwrap();
        assert!(matches!(RentcartConfig::load(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, "api_base_url = [").unwrap();
        assert!(matches!(RentcartConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
