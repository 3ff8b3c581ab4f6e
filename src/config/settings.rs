//! Application settings loaded from `stocktake.toml`.
//!
//! Every field has a default, so a missing section (or an empty file) yields a
//! usable configuration.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "stocktake.toml";

/// Configuration structure representing the entire config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database URL; `DATABASE_URL` overrides it
    pub database_url: Option<String>,
    /// Catalog import limits
    pub import: ImportSettings,
    /// Scan validation limits
    pub scan: ScanSettings,
}

/// Catalog import limits
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Hard ceiling on the uploaded file size, checked before parsing
    pub max_bytes: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Scan validation limits
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Longest accepted product code, in characters
    pub max_code_length: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_code_length: 64,
        }
    }
}

/// Limits enforced by the core, derived from [`AppConfig`].
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// See [`ImportSettings::max_bytes`]
    pub max_import_bytes: usize,
    /// See [`ScanSettings::max_code_length`]
    pub max_code_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        AppConfig::default().limits()
    }
}

impl AppConfig {
    /// Core limits from this configuration.
    #[must_use]
    pub const fn limits(&self) -> Limits {
        Limits {
            max_import_bytes: self.import.max_bytes,
            max_code_length: self.scan.max_code_length,
        }
    }
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Loads `./stocktake.toml`, falling back to defaults when it does not exist.
pub fn load_default_config() -> Result<AppConfig> {
    if Path::new(DEFAULT_CONFIG_FILE).exists() {
        load_config(DEFAULT_CONFIG_FILE)
    } else {
        tracing::info!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            database_url = "sqlite::memory:"

            [import]
            max_bytes = 2048

            [scan]
            max_code_length = 20
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database_url.as_deref(), Some("sqlite::memory:"));
        let limits = config.limits();
        assert_eq!(limits.max_import_bytes, 2048);
        assert_eq!(limits.max_code_length, 20);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.import.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.scan.max_code_length, 64);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let result = load_config("does/not/exist.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
