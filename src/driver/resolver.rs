// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Driver resolution from destination URLs

use super::backend::BackupStoreDriver;
use super::filesystem::FilesystemDriver;
use super::s3::{S3Driver, S3Settings};
use crate::config::DriversConfig;
use crate::error::{BackupStoreError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Builds a driver for a parsed destination URL
pub type DriverFactoryFn =
    Arc<dyn Fn(&Url) -> anyhow::Result<Arc<dyn BackupStoreDriver>> + Send + Sync>;

/// Maps destination URLs to drivers by scheme.
///
/// Built-in schemes are `vfs`, `nfs` and `s3`. Additional schemes can be
/// registered per resolver and take precedence over the built-ins.
#[derive(Clone, Default)]
pub struct DriverResolver {
    config: DriversConfig,
    custom: HashMap<String, DriverFactoryFn>,
}

impl DriverResolver {
    pub fn new(config: DriversConfig) -> Self {
        Self {
            config,
            custom: HashMap::new(),
        }
    }

    /// Serve `scheme` with `factory` instead of a built-in driver
    pub fn register<F>(&mut self, scheme: &str, factory: F)
    where
        F: Fn(&Url) -> anyhow::Result<Arc<dyn BackupStoreDriver>> + Send + Sync + 'static,
    {
        self.custom
            .insert(scheme.to_ascii_lowercase(), Arc::new(factory));
    }

    /// Resolve the driver serving `destination`
    ///
    /// Any query string is ignored, so backup URLs resolve to the driver of
    /// the destination they were encoded from.
    pub fn resolve(&self, destination: &str) -> Result<Arc<dyn BackupStoreDriver>> {
        let base = strip_query(destination);
        let url = Url::parse(base).map_err(|e| unsupported(destination, e.to_string()))?;

        if let Some(factory) = self.custom.get(url.scheme()) {
            return (factory.as_ref())(&url).map_err(BackupStoreError::Driver);
        }

        match url.scheme() {
            "vfs" => {
                if url.host_str().is_some_and(|host| !host.is_empty()) {
                    return Err(unsupported(
                        destination,
                        "vfs destination needs an absolute path, e.g. vfs:///dir",
                    ));
                }
                let path = decoded_path(&url, destination)?;
                if path.is_empty() || path == "/" {
                    return Err(unsupported(destination, "vfs destination needs a directory path"));
                }
                Ok(Arc::new(FilesystemDriver::vfs(path)))
            }

            "nfs" => {
                let host = url
                    .host_str()
                    .filter(|host| !host.is_empty())
                    .ok_or_else(|| unsupported(destination, "nfs destination needs a host"))?;
                let path = decoded_path(&url, destination)?;
                let export = path.trim_matches('/');
                let mount_path = PathBuf::from(&self.config.nfs.mount_root)
                    .join(host)
                    .join(export);
                Ok(Arc::new(FilesystemDriver::nfs(base.trim_end_matches('/'), mount_path)))
            }

            "s3" => {
                let settings = self.s3_settings(&url, destination)?;
                let driver = S3Driver::new(settings).map_err(BackupStoreError::Driver)?;
                Ok(Arc::new(driver))
            }

            unknown => Err(unsupported(
                destination,
                format!("unknown scheme '{}'. Supported: vfs, nfs, s3", unknown),
            )),
        }
    }

    /// `s3://bucket@region/prefix` or `s3://bucket/prefix`
    fn s3_settings(&self, url: &Url, destination: &str) -> Result<S3Settings> {
        let s3 = &self.config.s3;
        let (bucket, region) = if url.username().is_empty() {
            let bucket = url
                .host_str()
                .ok_or_else(|| unsupported(destination, "s3 destination needs a bucket"))?;
            (bucket.to_string(), s3.region.clone())
        } else {
            let region = url
                .host_str()
                .ok_or_else(|| unsupported(destination, "s3 destination needs a region"))?;
            (url.username().to_string(), region.to_string())
        };

        Ok(S3Settings {
            bucket,
            prefix: url.path().trim_matches('/').to_string(),
            region,
            endpoint: s3.endpoint.clone(),
            access_key_id: s3.access_key_id.clone().unwrap_or_default(),
            secret_access_key: s3.secret_access_key.clone().unwrap_or_default(),
            timeout_seconds: s3.timeout_seconds,
        })
    }
}

/// URL path with percent-escapes decoded back to the local path
fn decoded_path(url: &Url, destination: &str) -> Result<String> {
    urlencoding::decode(url.path())
        .map(|path| path.into_owned())
        .map_err(|e| unsupported(destination, format!("path is not valid UTF-8: {}", e)))
}

fn strip_query(destination: &str) -> &str {
    destination
        .split_once('?')
        .map_or(destination, |(base, _)| base)
}

fn unsupported(destination: &str, reason: impl Into<String>) -> BackupStoreError {
    BackupStoreError::UnsupportedDestination {
        destination: destination.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NfsConfig, S3Config};

    fn resolver() -> DriverResolver {
        DriverResolver::new(DriversConfig {
            nfs: NfsConfig {
                mount_root: "/mnt/nfs".to_string(),
            },
            s3: S3Config {
                access_key_id: Some("AKIDEXAMPLE".to_string()),
                secret_access_key: Some("secret".to_string()),
                ..S3Config::default()
            },
        })
    }

    #[test]
    fn test_resolve_vfs() {
        let driver = resolver().resolve("vfs:///var/lib/backups").unwrap();
        assert_eq!(driver.kind(), "vfs");
        assert_eq!(driver.url(), "vfs:///var/lib/backups");
    }

    #[test]
    fn test_resolve_nfs_keeps_canonical_url() {
        let driver = resolver().resolve("nfs://host/store").unwrap();
        assert_eq!(driver.kind(), "nfs");
        assert_eq!(driver.url(), "nfs://host/store");
    }

    #[test]
    fn test_resolve_ignores_backup_query() {
        let driver = resolver()
            .resolve("nfs://host/store?backup=backup-abc&volume=vol1")
            .unwrap();
        assert_eq!(driver.url(), "nfs://host/store");
    }

    #[test]
    fn test_resolve_s3_forms() {
        let with_region = resolver().resolve("s3://bucket@eu-west-1/prefix").unwrap();
        assert_eq!(with_region.kind(), "s3");
        assert_eq!(with_region.url(), "s3://bucket@eu-west-1/prefix");

        let default_region = resolver().resolve("s3://bucket/prefix").unwrap();
        assert_eq!(default_region.url(), "s3://bucket@us-east-1/prefix");
    }

    #[test]
    fn test_s3_without_credentials_is_driver_failure() {
        let result = DriverResolver::default().resolve("s3://bucket/prefix");
        assert!(matches!(result, Err(BackupStoreError::Driver(_))));
    }

    #[test]
    fn test_unknown_scheme() {
        let result = resolver().resolve("ftp://host/store");
        match result {
            Err(BackupStoreError::UnsupportedDestination { reason, .. }) => {
                assert!(reason.contains("unknown scheme"))
            }
            _ => panic!("expected UnsupportedDestination"),
        }
        assert!(matches!(
            resolver().resolve("not a url"),
            Err(BackupStoreError::UnsupportedDestination { .. })
        ));
    }

    #[test]
    fn test_vfs_with_host_rejected() {
        let result = resolver().resolve("vfs://relative/path");
        match result {
            Err(BackupStoreError::UnsupportedDestination { reason, .. }) => {
                assert!(reason.contains("absolute path"))
            }
            _ => panic!("expected UnsupportedDestination"),
        }
    }

    #[test]
    fn test_nfs_without_host_rejected() {
        assert!(matches!(
            resolver().resolve("nfs:///store"),
            Err(BackupStoreError::UnsupportedDestination { .. })
        ));
    }

    #[tokio::test]
    async fn test_vfs_path_with_space_is_decoded() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let target = temp_dir.path().join("my backups");
        let destination = format!("vfs://{}", target.display());

        let driver = resolver().resolve(&destination).unwrap();
        assert_eq!(driver.url(), destination);

        driver
            .write("backupstore/volume.cfg", bytes::Bytes::from_static(b"{}"))
            .await
            .unwrap();

        assert!(target.join("backupstore/volume.cfg").exists());
        let siblings: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(siblings, vec![std::ffi::OsString::from("my backups")]);
    }

    #[test]
    fn test_custom_scheme_takes_precedence() {
        let mut resolver = resolver();
        resolver.register("vfs", |_url: &Url| {
            Ok(Arc::new(FilesystemDriver::nfs("nfs://fake/export", "/tmp/fake"))
                as Arc<dyn BackupStoreDriver>)
        });
        let driver = resolver.resolve("vfs:///anything").unwrap();
        assert_eq!(driver.kind(), "nfs");
    }
}
