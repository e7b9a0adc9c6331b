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

// Backup registry
//
// Backup records are written once by the workflow that produced the backup
// and only read back afterwards.

use crate::driver::BackupStoreDriver;
use crate::error::{BackupStoreError, Result};
use crate::model::Backup;
use crate::naming::{backup_name_from_config, validate_backup_name, validate_volume_name, StoreLayout};
use crate::record::{load_record, save_record};
use crate::volume::volume_exists;
use tracing::debug;

pub async fn backup_exists(
    layout: &StoreLayout,
    backup_name: &str,
    volume_name: &str,
    driver: &dyn BackupStoreDriver,
) -> Result<bool> {
    let path = layout.backup_config_path(backup_name, volume_name)?;
    Ok(driver.file_exists(&path).await?)
}

pub async fn load_backup(
    layout: &StoreLayout,
    backup_name: &str,
    volume_name: &str,
    driver: &dyn BackupStoreDriver,
) -> Result<Backup> {
    let path = layout.backup_config_path(backup_name, volume_name)?;
    if !driver.file_exists(&path).await? {
        return Err(BackupStoreError::BackupNotFound {
            backup: backup_name.to_string(),
            volume: volume_name.to_string(),
        });
    }
    load_record(driver, &path).await
}

/// Persist a finished backup under its (already registered) volume
pub async fn save_backup(
    layout: &StoreLayout,
    backup: &Backup,
    driver: &dyn BackupStoreDriver,
) -> Result<()> {
    validate_backup_name(&backup.name)?;
    validate_volume_name(&backup.volume_name)?;

    if !volume_exists(layout, &backup.volume_name, driver).await? {
        return Err(BackupStoreError::VolumeNotFound(backup.volume_name.clone()));
    }

    let path = layout.backup_config_path(&backup.name, &backup.volume_name)?;
    save_record(driver, &path, backup).await?;
    debug!(
        "Saved backup {} of volume {} in backupstore",
        backup.name, backup.volume_name
    );
    Ok(())
}

/// Names of the backups recorded for `volume_name`, sorted
pub async fn list_backup_names(
    layout: &StoreLayout,
    volume_name: &str,
    driver: &dyn BackupStoreDriver,
) -> Result<Vec<String>> {
    let backups_dir = layout.backups_dir(volume_name)?;
    let mut names: Vec<String> = driver
        .list(&backups_dir)
        .await?
        .iter()
        .filter_map(|file| backup_name_from_config(file))
        .map(str::to_string)
        .collect();
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FilesystemDriver;
    use crate::model::{BackupContent, BlockMapping, Snapshot, Volume};
    use crate::volume::register_volume;
    use bytes::Bytes;
    use tempfile::TempDir;

    async fn setup() -> (StoreLayout, FilesystemDriver, Volume, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let driver = FilesystemDriver::vfs(temp_dir.path());
        let layout = StoreLayout::default();
        let volume = Volume::new("vol1", "vfs", 1073741824);
        register_volume(&layout, &volume, &driver).await.unwrap();
        (layout, driver, volume, temp_dir)
    }

    fn block_backup(name: &str, volume: &Volume) -> Backup {
        Backup::new(
            name,
            volume,
            &Snapshot::new("snap1"),
            536870912,
            BackupContent::Blocks(vec![BlockMapping {
                offset: 0,
                block_checksum: "ab12".to_string(),
            }]),
        )
    }

    #[tokio::test]
    async fn test_save_and_load_backup() {
        let (layout, driver, volume, _temp_dir) = setup().await;
        let backup = block_backup("backup-abc", &volume);

        save_backup(&layout, &backup, &driver).await.unwrap();

        assert!(backup_exists(&layout, "backup-abc", "vol1", &driver).await.unwrap());
        let loaded = load_backup(&layout, "backup-abc", "vol1", &driver).await.unwrap();
        assert_eq!(loaded, backup);
    }

    #[tokio::test]
    async fn test_load_missing_backup() {
        let (layout, driver, _volume, _temp_dir) = setup().await;
        let result = load_backup(&layout, "backup-none", "vol1", &driver).await;
        assert!(matches!(result, Err(BackupStoreError::BackupNotFound { .. })));
    }

    #[tokio::test]
    async fn test_save_requires_registered_volume() {
        let (layout, driver, _volume, _temp_dir) = setup().await;
        let orphan = Volume::new("vol2", "vfs", 1);
        let result = save_backup(&layout, &block_backup("backup-x", &orphan), &driver).await;
        assert!(matches!(result, Err(BackupStoreError::VolumeNotFound(name)) if name == "vol2"));
    }

    #[tokio::test]
    async fn test_list_backup_names_skips_foreign_files() {
        let (layout, driver, volume, _temp_dir) = setup().await;
        for name in ["backup-2", "backup-1"] {
            save_backup(&layout, &block_backup(name, &volume), &driver)
                .await
                .unwrap();
        }
        let backups_dir = layout.backups_dir("vol1").unwrap();
        driver
            .write(&format!("{}notes.txt", backups_dir), Bytes::from_static(b"x"))
            .await
            .unwrap();

        assert_eq!(
            list_backup_names(&layout, "vol1", &driver).await.unwrap(),
            vec!["backup-1", "backup-2"]
        );
    }

    #[tokio::test]
    async fn test_corrupt_record_is_serialization_error() {
        let (layout, driver, _volume, _temp_dir) = setup().await;
        let path = layout.backup_config_path("backup-bad", "vol1").unwrap();
        driver.write(&path, Bytes::from_static(b"{not json")).await.unwrap();

        let result = load_backup(&layout, "backup-bad", "vol1", &driver).await;
        assert!(matches!(result, Err(BackupStoreError::Serialization { .. })));
    }
}
