//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    load_config, load_config_or_default, Config, ConfigError, BASE_APP_NAME,
    KEYPAIR_PATH_ENV, STORAGE_DIR_ENV,
};
