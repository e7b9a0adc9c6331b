// Configuration module for backupstore
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::ConfigLoader;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BackupStoreConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<BackupStoreConfig> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Allow environment variables to override config values
pub fn apply_env_overrides(config: &mut BackupStoreConfig) -> Result<()> {
    if let Ok(root) = std::env::var("BACKUPSTORE_ROOT") {
        config.store.root = root;
    }

    if let Ok(region) = std::env::var("AWS_REGION") {
        config.drivers.s3.region = region;
    }

    if let Ok(key_id) = std::env::var("AWS_ACCESS_KEY_ID") {
        config.drivers.s3.access_key_id = Some(key_id);
    }

    if let Ok(secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
        config.drivers.s3.secret_access_key = Some(secret);
    }

    ConfigLoader::validate(config).context("Invalid configuration after environment overrides")
}
