// Configuration system integration tests

use backupstore::config::{load_config, BackupStoreConfig};
use backupstore::BackupStore;
use std::fs;
use std::path::PathBuf;

#[test]
fn test_load_default_config() {
    let config_path = PathBuf::from("config/default.yaml");

    if config_path.exists() {
        let result = load_config(&config_path);
        assert!(result.is_ok(), "Failed to load default config: {:?}", result.err());

        let config = result.unwrap();
        assert_eq!(config.drivers.nfs.mount_root, "/var/lib/backupstore/nfs");
        assert_eq!(config.drivers.s3.timeout_seconds, 300);
        assert_eq!(config.logging.level, "info");
    }
}

#[test]
fn test_config_with_env_vars() {
    let temp_config = r#"
store:
  root: ${BACKUPSTORE_IT_ROOT:-it-root}

drivers:
  nfs:
    mount_root: ${BACKUPSTORE_IT_MOUNT:-/mnt/it}
  s3:
    region: eu-central-1
    endpoint: http://localhost:9000

logging:
  level: debug
  format: json
"#;

    std::env::set_var("BACKUPSTORE_IT_MOUNT", "/srv/nfs");
    std::env::remove_var("BACKUPSTORE_IT_ROOT");

    let temp_dir = tempfile::TempDir::new().unwrap();
    let config_path = temp_dir.path().join("test_config.yaml");
    fs::write(&config_path, temp_config).unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(config.store.root, "it-root");
    assert_eq!(config.drivers.nfs.mount_root, "/srv/nfs");
    assert_eq!(config.drivers.s3.region, "eu-central-1");
    assert_eq!(config.drivers.s3.endpoint.as_deref(), Some("http://localhost:9000"));
    assert_eq!(config.logging.format, "json");

    std::env::remove_var("BACKUPSTORE_IT_MOUNT");

    let store = BackupStore::new(&config);
    assert_eq!(store.layout().root(), "it-root");
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config_path = temp_dir.path().join("bad.yaml");
    fs::write(&config_path, "store:\n  root: ../escape\n").unwrap();

    let result = load_config(&config_path);
    assert!(result.is_err());
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("store.root"), "unexpected error: {}", message);
}

#[test]
fn test_missing_config_file() {
    let result = load_config("does/not/exist.yaml");
    assert!(result.is_err());
}

#[test]
fn test_empty_document_uses_defaults() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config_path = temp_dir.path().join("empty.yaml");
    fs::write(&config_path, "{}\n").unwrap();

    let config = load_config(&config_path).unwrap();
    let defaults = BackupStoreConfig::default();
    assert_eq!(config.store.root, defaults.store.root);
    assert_eq!(config.drivers.s3.region, defaults.drivers.s3.region);
}
