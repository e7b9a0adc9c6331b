// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::{Component, Path};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<BackupStoreConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        Self::parse(&content)
    }

    /// Parse and validate YAML configuration text
    pub fn parse(content: &str) -> Result<BackupStoreConfig> {
        let content = Self::substitute_env_vars(content);

        let config: BackupStoreConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${BACKUPSTORE_ROOT:-backupstore} -> backupstore (if BACKUPSTORE_ROOT not set)
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    // Keep original if no default and var not found
                    None => format!("${{{}}}", var_name),
                },
            }
        })
        .to_string()
    }

    /// Validate configuration
    pub fn validate(config: &BackupStoreConfig) -> Result<()> {
        let root = config.store.root.trim_matches('/');
        if root.is_empty() {
            bail!("store.root cannot be empty");
        }
        if Path::new(root)
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::CurDir))
        {
            bail!("store.root must not contain '.' or '..' components: {}", config.store.root);
        }

        if config.drivers.nfs.mount_root.is_empty() {
            bail!("drivers.nfs.mount_root cannot be empty");
        }

        if config.drivers.s3.region.is_empty() {
            bail!("drivers.s3.region cannot be empty");
        }

        if config.drivers.s3.timeout_seconds == 0 {
            bail!("drivers.s3.timeout_seconds must be > 0");
        }

        match config.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => bail!("Unknown logging.level: '{}'", other),
        }

        match config.logging.format.as_str() {
            "text" | "json" => {}
            other => bail!("Unknown logging.format: '{}'. Supported: text, json", other),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("BACKUPSTORE_TEST_VAR", "test_value");

        let input = "root: ${BACKUPSTORE_TEST_VAR}";
        let output = ConfigLoader::substitute_env_vars(input);
        assert_eq!(output, "root: test_value");

        std::env::remove_var("BACKUPSTORE_TEST_VAR");
    }

    #[test]
    fn test_env_var_with_default() {
        std::env::remove_var("BACKUPSTORE_TEST_VAR2");

        let input = "region: ${BACKUPSTORE_TEST_VAR2:-eu-west-1}";
        let output = ConfigLoader::substitute_env_vars(input);
        assert_eq!(output, "region: eu-west-1");
    }

    #[test]
    fn test_missing_var_without_default_is_kept() {
        std::env::remove_var("BACKUPSTORE_TEST_VAR3");

        let output = ConfigLoader::substitute_env_vars("key: ${BACKUPSTORE_TEST_VAR3}");
        assert_eq!(output, "key: ${BACKUPSTORE_TEST_VAR3}");
    }

    #[test]
    fn test_validation_rejects_traversing_root() {
        let mut config = BackupStoreConfig::default();
        config.store.root = "backups/../../etc".to_string();

        let result = ConfigLoader::validate(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("store.root"));
    }

    #[test]
    fn test_validation_rejects_empty_root() {
        let mut config = BackupStoreConfig::default();
        config.store.root = "/".to_string();

        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = BackupStoreConfig::default();
        config.logging.level = "verbose".to_string();

        let result = ConfigLoader::validate(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("logging.level"));
    }

    #[test]
    fn test_parse_minimal() {
        let config = ConfigLoader::parse("store:\n  root: custom\n").unwrap();
        assert_eq!(config.store.root, "custom");
        assert_eq!(config.drivers.s3.region, "us-east-1");
        assert_eq!(config.logging.level, "info");
    }
}
