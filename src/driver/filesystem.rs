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

// Filesystem driver implementation
//
// Serves both `vfs://` destinations (a local directory) and `nfs://`
// destinations (an export already mounted under the configured mount root).

use super::backend::BackupStoreDriver;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Filesystem driver for metadata stored on a local or mounted directory
pub struct FilesystemDriver {
    kind: &'static str,
    url: String,
    base_path: PathBuf,
}

impl FilesystemDriver {
    /// Driver for `vfs://<path>`
    pub fn vfs(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        let url = format!("vfs://{}", base_path.display());

        info!("Initializing vfs driver at: {}", base_path.display());

        Self {
            kind: "vfs",
            url,
            base_path,
        }
    }

    /// Driver for an NFS export mounted at `mount_path`
    ///
    /// `url` stays the `nfs://host/export` form callers addressed it by.
    pub fn nfs(url: impl Into<String>, mount_path: impl Into<PathBuf>) -> Self {
        let url = url.into();
        let base_path = mount_path.into();

        info!(
            "Initializing nfs driver for {} at: {}",
            url,
            base_path.display()
        );

        Self {
            kind: "nfs",
            url,
            base_path,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a store path onto the local filesystem
    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("Path escapes driver base directory: {}", path);
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl BackupStoreDriver for FilesystemDriver {
    fn kind(&self) -> &str {
        self.kind
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        let full = self.full_path(path)?;
        match fs::metadata(&full).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context(format!("Failed to stat {}", full.display())),
        }
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let full = self.full_path(path)?;
        let data = fs::read(&full)
            .await
            .context(format!("Failed to read file: {}", full.display()))?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        let dest = self.full_path(path)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create directory: {}", parent.display()))?;
        }

        // Write to a temp file next to the target, then rename over it
        let tmp_path = dest.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        let mut file = fs::File::create(&tmp_path)
            .await
            .context(format!("Failed to create file: {}", tmp_path.display()))?;
        file.write_all(&data).await.context("Failed to write data")?;
        file.sync_all().await.context("fsync failed")?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &dest).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e).context(format!("Failed to rename into {}", dest.display()));
        }

        debug!("Wrote {} bytes to {}", data.len(), dest.display());
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.full_path(path)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context(format!("Failed to list {}", dir.display())),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .context(format!("Failed to list {}", dir.display()))?
        {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let full = self.full_path(path)?;
        let result = match fs::symlink_metadata(&full).await {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&full).await,
            Ok(_) => fs::remove_file(&full).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                debug!("Removed {}", full.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context(format!("Failed to remove {}", full.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_driver() -> (FilesystemDriver, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let driver = FilesystemDriver::vfs(temp_dir.path());
        (driver, temp_dir)
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (driver, _temp_dir) = create_test_driver();

        driver
            .write("a/b/file.cfg", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        assert!(driver.file_exists("a/b/file.cfg").await.unwrap());
        assert!(!driver.file_exists("a/b").await.unwrap());
        assert_eq!(driver.read("a/b/file.cfg").await.unwrap(), Bytes::from_static(b"{}"));

        // No temp files left behind
        assert_eq!(driver.list("a/b/").await.unwrap(), vec!["file.cfg".to_string()]);
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let (driver, _temp_dir) = create_test_driver();
        assert!(driver.list("nothing/here/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_directory_recursively() {
        let (driver, _temp_dir) = create_test_driver();
        driver.write("vol/volume.cfg", Bytes::from_static(b"v")).await.unwrap();
        driver.write("vol/backups/backup_b1.cfg", Bytes::from_static(b"b")).await.unwrap();

        driver.remove("vol/").await.unwrap();

        assert!(!driver.file_exists("vol/volume.cfg").await.unwrap());
        assert!(driver.list("vol/").await.unwrap().is_empty());

        // Removing again is fine
        driver.remove("vol/").await.unwrap();
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let (driver, _temp_dir) = create_test_driver();
        assert!(driver.read("../outside").await.is_err());
        assert!(driver.write("a/../../x", Bytes::new()).await.is_err());
    }

    #[test]
    fn test_urls() {
        let vfs = FilesystemDriver::vfs("/var/backups");
        assert_eq!(vfs.kind(), "vfs");
        assert_eq!(vfs.url(), "vfs:///var/backups");

        let nfs = FilesystemDriver::nfs("nfs://host/store", "/mnt/nfs/host/store");
        assert_eq!(nfs.kind(), "nfs");
        assert_eq!(nfs.url(), "nfs://host/store");
        assert_eq!(nfs.base_path(), Path::new("/mnt/nfs/host/store"));
    }
}
