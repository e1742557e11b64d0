//! # CLI Configuration
//!
//! Where the store lives, where attachments and exports go, and how noisy
//! the logs are.
//!
//! ## Precedence
//! ```text
//! built-in defaults  <  config.toml  <  PARTSHOP_* env vars  <  CLI flags
//! ```
//!
//! ## Configuration File
//! ```toml
//! database_path = "/home/me/.local/share/partshop/partshop.db"
//! export_dir = "/home/me/.local/share/partshop/exports"
//! theme = "dark"
//! log_filter = "info,partshop=debug,sqlx=warn"
//! ```
//!
//! ## Environment Variables
//! - `PARTSHOP_DB_PATH`: Database file
//! - `PARTSHOP_ATTACHMENTS_DIR`: Attachment root
//! - `PARTSHOP_EXPORT_DIR`: Directory exports are written to

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use partshop_core::ThemePreference;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default tracing filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "info,partshop=debug,sqlx=warn";

// =============================================================================
// Configuration Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// App Configuration
// =============================================================================

/// Persisted CLI settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// Attachment root. `None` means `attachments/` next to the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments_dir: Option<PathBuf>,

    /// Where `export` writes CSV files.
    pub export_dir: PathBuf,

    /// Theme written to the store by `init`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemePreference>,

    /// Tracing filter directive.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        AppConfig {
            database_path: data_dir.join("partshop.db"),
            attachments_dir: None,
            export_dir: data_dir.join("exports"),
            theme: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from file, then applies environment overrides.
    ///
    /// A missing file is not an error; the defaults are used instead.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();

        let path = path.or_else(default_config_path);
        if let Some(path) = path.filter(|p| p.exists()) {
            let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "Loaded config file");
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Writes the configuration as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `PARTSHOP_*` overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get("PARTSHOP_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(dir) = get("PARTSHOP_ATTACHMENTS_DIR") {
            self.attachments_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = get("PARTSHOP_EXPORT_DIR") {
            self.export_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database_path is empty".into()));
        }
        if self.export_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("export_dir is empty".into()));
        }
        if matches!(&self.attachments_dir, Some(dir) if dir.as_os_str().is_empty()) {
            return Err(ConfigError::Invalid("attachments_dir is empty".into()));
        }
        Ok(())
    }
}

/// Platform config file location, e.g. `~/.config/partshop/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "partshop", "partshop").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Platform data directory, falling back to the working directory.
fn default_data_dir() -> PathBuf {
    ProjectDirs::from("dev", "partshop", "partshop")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.database_path.ends_with("partshop.db"));
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_file_values_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "database_path = \"/tmp/parts.db\"\ntheme = \"dark\"\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(path)).unwrap();
        assert_eq!(config.theme, Some(ThemePreference::Dark));
        // Unset keys keep their defaults.
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.export_dir, AppConfig::default().export_dir);
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "database_path = [").unwrap();

        assert!(matches!(AppConfig::load(Some(path)), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("PARTSHOP_DB_PATH", "/data/shop.db"),
            ("PARTSHOP_ATTACHMENTS_DIR", "/data/files"),
            ("PARTSHOP_EXPORT_DIR", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        let export_dir = config.export_dir.clone();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_path, PathBuf::from("/data/shop.db"));
        assert_eq!(config.attachments_dir, Some(PathBuf::from("/data/files")));
        assert_eq!(config.export_dir, export_dir);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.database_path = dir.path().join("shop.db");
        config.theme = Some(ThemePreference::Light);
        config.save(&path).unwrap();

        let loaded: AppConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_empty_path_is_invalid() {
        let mut config = AppConfig::default();
        config.database_path = PathBuf::new();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
