//! Configuration management for scanner calibration
//!
//! Provides persistent configuration that is saved to and loaded from a
//! platform-specific config file.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/scanner-calibration/config.toml` |
//! | macOS | `~/Library/Application Support/scanner-calibration/config.toml` |
//! | Windows | `%APPDATA%\scanner-calibration\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use scanner_calibration::Config;
//!
//! // Load existing config or use defaults
//! let mut config = Config::load().unwrap_or_default();
//!
//! // Allow one extra dead-key round
//! config.calibration.retry_rounds = 2;
//!
//! // Save to disk
//! config.save().expect("Failed to save config");
//! ```

use crate::parser::catalog::FieldRole;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
    /// IO error reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse config file
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the path to the config file.
///
/// Creates the config directory if it doesn't exist.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    let app_dir = config_dir.join("scanner-calibration");

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }

    Ok(app_dir.join("config.toml"))
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Calibration engine settings
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Parser settings
    #[serde(default)]
    pub parser: ParserConfig,
}

/// Calibration engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Hard limit on dead-key rounds per session
    pub max_dead_key_rounds: usize,
    /// Extra rounds for re-probing a dead key whose round was malformed
    pub retry_rounds: usize,
    /// Recognition of separators reported as decimal strings
    pub decimal_separators: DecimalSeparatorConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_dead_key_rounds: 7,
            retry_rounds: 1,
            decimal_separators: DecimalSeparatorConfig::default(),
        }
    }
}

/// Decimal separator substitutes, e.g. "0029" for GS
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DecimalSeparatorConfig {
    pub enabled: bool,
    /// Shortest accepted substitute, in digits
    pub min_width: usize,
    /// Longest accepted substitute, in digits
    pub max_width: usize,
}

impl Default for DecimalSeparatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_width: 2,
            max_width: 4,
        }
    }
}

/// Parser configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParserConfig {
    /// Roles that must be present for a pack identifier to be valid
    pub mandatory_roles: Vec<FieldRole>,
    /// Century added to two-digit years in dates
    pub century: i32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            mandatory_roles: vec![
                FieldRole::ProductCode,
                FieldRole::SerialNumber,
                FieldRole::BatchIdentifier,
                FieldRole::Expiry,
            ],
            century: 2000,
        }
    }
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_config_path() -> PathBuf {
        env::temp_dir().join(format!(
            "scanner-calibration-test-{}.toml",
            std::process::id()
        ))
    }

    #[test]
    fn config_default_values() {
        let config = Config::default();
        assert_eq!(config.calibration.max_dead_key_rounds, 7);
        assert_eq!(config.calibration.retry_rounds, 1);
        assert!(config.calibration.decimal_separators.enabled);
        assert_eq!(config.calibration.decimal_separators.min_width, 2);
        assert_eq!(config.calibration.decimal_separators.max_width, 4);
        assert_eq!(config.parser.mandatory_roles.len(), 4);
        assert_eq!(config.parser.century, 2000);
    }

    #[test]
    fn config_save_and_load_roundtrip() {
        let path = temp_config_path();

        let mut config = Config::default();
        config.calibration.retry_rounds = 3;
        config.parser.mandatory_roles = vec![FieldRole::ProductCode];

        config.save_to(&path).expect("Failed to save config");
        let loaded = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(loaded, config);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn config_load_missing_file_fails() {
        let path = PathBuf::from("/nonexistent/path/config.toml");
        let result = Config::load_from(&path);
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn config_serializes_to_toml() {
        let toml_str = toml::to_string_pretty(&Config::default()).expect("Failed to serialize");
        assert!(toml_str.contains("[calibration]"));
        assert!(toml_str.contains("[calibration.decimal_separators]"));
        assert!(toml_str.contains("[parser]"));
        assert!(toml_str.contains("max_dead_key_rounds = 7"));
    }

    #[test]
    fn config_deserializes_partial_toml() {
        let toml_str = r#"
[calibration]
max_dead_key_rounds = 3

[parser]
mandatory_roles = ["ProductCode", "Expiry"]
century = 1900
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");
        assert_eq!(config.calibration.max_dead_key_rounds, 3);
        assert_eq!(config.calibration.retry_rounds, 1);
        assert!(config.calibration.decimal_separators.enabled);
        assert_eq!(
            config.parser.mandatory_roles,
            vec![FieldRole::ProductCode, FieldRole::Expiry]
        );
        assert_eq!(config.parser.century, 1900);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config: Config = toml::from_str("").expect("Failed to deserialize");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::NoConfigDir;
        assert_eq!(err.to_string(), "Could not determine config directory");

        let io_err = ConfigError::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(io_err.to_string().contains("IO error"));
    }
}
