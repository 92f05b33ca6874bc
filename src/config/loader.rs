//! Configuration Loader
//!
//! Loads and validates configuration from a TOML file. Every section is
//! optional; a missing file yields the defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::adapters::storage::CodecKind;
use crate::application::DuplicatePolicy;

/// Application name before any `--name` suffix
pub const BASE_APP_NAME: &str = "TradeVault";

/// Overrides `storage.dir`
pub const STORAGE_DIR_ENV: &str = "FAILED_TRADES_STORAGE_DIR";

/// Overrides `identity.keypair_path`
pub const KEYPAIR_PATH_ENV: &str = "FAILED_TRADES_KEYPAIR_PATH";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub identity: IdentitySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Where and how failed trades are stored
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSection {
    /// Data directory; defaults to `~/.<app name>/db`
    #[serde(default)]
    pub dir: Option<String>,
    /// Record codec: "json" or "bincode"
    #[serde(default)]
    pub codec: CodecKind,
    /// Duplicate check on add: "id" or "identity"
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

impl StorageSection {
    /// Get storage directory with environment variable override
    /// Checks FAILED_TRADES_STORAGE_DIR env var first, then config value, then
    /// the per-application default
    pub fn get_dir(&self, app_name: &str) -> PathBuf {
        self.get_dir_with(app_name, |key| std::env::var(key).ok())
    }

    fn get_dir_with(&self, app_name: &str, env: impl Fn(&str) -> Option<String>) -> PathBuf {
        let raw = env(STORAGE_DIR_ENV)
            .or_else(|| self.dir.clone())
            .unwrap_or_else(|| format!("~/.{}/db", app_name.to_lowercase()));
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }
}

/// Node identity key
#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySection {
    /// Keypair file (JSON byte array)
    #[serde(default)]
    pub keypair_path: Option<String>,
    /// Fall back to a throwaway identity when no keypair is configured
    #[serde(default = "default_allow_random")]
    pub allow_random: bool,
}

fn default_allow_random() -> bool {
    true
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            keypair_path: None,
            allow_random: default_allow_random(),
        }
    }
}

impl IdentitySection {
    /// Get keypair path with environment variable override
    /// Checks FAILED_TRADES_KEYPAIR_PATH env var first, falls back to config value
    pub fn get_keypair_path(&self) -> Option<PathBuf> {
        self.get_keypair_path_with(|key| std::env::var(key).ok())
    }

    fn get_keypair_path_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
        env(KEYPAIR_PATH_ENV)
            .or_else(|| self.keypair_path.clone())
            .map(|p| PathBuf::from(shellexpand::tilde(&p).into_owned()))
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration, using defaults when the file does not exist
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    load_config(path)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.storage.dir {
            if dir.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "storage.dir cannot be empty".to_string(),
                ));
            }
        }

        if let Some(path) = &self.identity.keypair_path {
            if path.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "identity.keypair_path cannot be empty".to_string(),
                ));
            }
        }

        if self.identity.keypair_path.is_none() && !self.identity.allow_random {
            return Err(ConfigError::ValidationError(
                "identity.keypair_path is required when allow_random = false".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {:?}, got {}",
                LOG_LEVELS, self.logging.level
            )));
        }

        Ok(())
    }
}
