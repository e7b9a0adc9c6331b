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

// Volume registry
//
// None of these operations lock: an existence check followed by a write or
// remove can race with another caller working on the same volume.

use crate::driver::BackupStoreDriver;
use crate::error::{BackupStoreError, Result};
use crate::model::Volume;
use crate::naming::{is_hash_layer, is_valid_name, validate_volume_name, StoreLayout};
use crate::record::{load_record, save_record};
use tracing::{debug, error};

pub async fn volume_exists(
    layout: &StoreLayout,
    volume_name: &str,
    driver: &dyn BackupStoreDriver,
) -> Result<bool> {
    let path = layout.volume_config_path(volume_name)?;
    Ok(driver.file_exists(&path).await?)
}

/// Register `volume` with the store.
///
/// Registering a volume that already has a record succeeds without touching
/// the stored record, whatever attributes the new value carries.
pub async fn register_volume(
    layout: &StoreLayout,
    volume: &Volume,
    driver: &dyn BackupStoreDriver,
) -> Result<()> {
    validate_volume_name(&volume.name)?;

    if volume_exists(layout, &volume.name, driver).await? {
        debug!("Volume {} already registered in backupstore", volume.name);
        return Ok(());
    }

    if let Err(e) = write_volume(layout, volume, driver).await {
        error!("Failed to add backupstore volume {}: {}", volume.name, e);
        return Err(e);
    }
    debug!("Added backupstore volume {}", volume.name);

    Ok(())
}

/// Remove a volume record together with every backup and block beneath it
pub async fn deregister_volume(
    layout: &StoreLayout,
    volume_name: &str,
    driver: &dyn BackupStoreDriver,
) -> Result<()> {
    validate_volume_name(volume_name)?;

    if !volume_exists(layout, volume_name, driver).await? {
        return Err(BackupStoreError::VolumeNotFound(volume_name.to_string()));
    }

    let volume_dir = layout.volume_dir(volume_name)?;
    driver.remove(&volume_dir).await?;
    debug!("Removed volume directory in backupstore: {}", volume_dir);
    debug!("Removed backupstore volume {}", volume_name);

    Ok(())
}

pub async fn load_volume(
    layout: &StoreLayout,
    volume_name: &str,
    driver: &dyn BackupStoreDriver,
) -> Result<Volume> {
    let path = layout.volume_config_path(volume_name)?;
    if !driver.file_exists(&path).await? {
        return Err(BackupStoreError::VolumeNotFound(volume_name.to_string()));
    }
    load_record(driver, &path).await
}

/// Overwrite the volume record, e.g. to record `last_backup_name`.
///
/// The owning driver of an existing record is fixed: saving a value with a
/// different `driver` fails and leaves the record untouched.
pub async fn save_volume(
    layout: &StoreLayout,
    volume: &Volume,
    driver: &dyn BackupStoreDriver,
) -> Result<()> {
    validate_volume_name(&volume.name)?;

    if volume_exists(layout, &volume.name, driver).await? {
        let stored = load_volume(layout, &volume.name, driver).await?;
        if stored.driver != volume.driver {
            return Err(BackupStoreError::DriverMismatch {
                volume: volume.name.clone(),
                stored: stored.driver,
                requested: volume.driver.clone(),
            });
        }
    }

    write_volume(layout, volume, driver).await
}

async fn write_volume(
    layout: &StoreLayout,
    volume: &Volume,
    driver: &dyn BackupStoreDriver,
) -> Result<()> {
    let path = layout.volume_config_path(&volume.name)?;
    save_record(driver, &path, volume).await
}

/// Names of every volume stored at the driver's destination, sorted
pub async fn list_volume_names(
    layout: &StoreLayout,
    driver: &dyn BackupStoreDriver,
) -> Result<Vec<String>> {
    let volumes_dir = layout.volumes_dir();
    let mut names = Vec::new();

    for layer1 in driver.list(&volumes_dir).await? {
        if !is_hash_layer(&layer1) {
            continue;
        }
        let layer1_dir = format!("{}{}/", volumes_dir, layer1);
        for layer2 in driver.list(&layer1_dir).await? {
            if !is_hash_layer(&layer2) {
                continue;
            }
            let layer2_dir = format!("{}{}/", layer1_dir, layer2);
            names.extend(
                driver
                    .list(&layer2_dir)
                    .await?
                    .into_iter()
                    .filter(|name| is_valid_name(name)),
            );
        }
    }

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FilesystemDriver;
    use tempfile::TempDir;

    fn setup() -> (StoreLayout, FilesystemDriver, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let driver = FilesystemDriver::vfs(temp_dir.path());
        (StoreLayout::default(), driver, temp_dir)
    }

    #[tokio::test]
    async fn test_register_and_load() {
        let (layout, driver, _temp_dir) = setup();
        let volume = Volume::new("vol1", "vfs", 1073741824);

        register_volume(&layout, &volume, &driver).await.unwrap();

        let loaded = load_volume(&layout, "vol1", &driver).await.unwrap();
        assert_eq!(loaded, volume);
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let (layout, driver, _temp_dir) = setup();
        let original = Volume::new("vol1", "vfs", 1024);
        register_volume(&layout, &original, &driver).await.unwrap();

        let path = layout.volume_config_path("vol1").unwrap();
        let before = driver.read(&path).await.unwrap();

        let different = Volume::new("vol1", "nfs", 2048);
        register_volume(&layout, &different, &driver).await.unwrap();

        assert_eq!(driver.read(&path).await.unwrap(), before);
        assert_eq!(load_volume(&layout, "vol1", &driver).await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_register_invalid_name_does_no_io() {
        let (layout, driver, temp_dir) = setup();
        let volume = Volume::new("../vol", "vfs", 1);

        let result = register_volume(&layout, &volume, &driver).await;
        assert!(matches!(result, Err(BackupStoreError::InvalidName { .. })));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_deregister_missing_volume() {
        let (layout, driver, _temp_dir) = setup();
        let result = deregister_volume(&layout, "vol1", &driver).await;
        assert!(matches!(result, Err(BackupStoreError::VolumeNotFound(name)) if name == "vol1"));
    }

    #[tokio::test]
    async fn test_deregister_removes_volume() {
        let (layout, driver, _temp_dir) = setup();
        register_volume(&layout, &Volume::new("vol1", "vfs", 1), &driver)
            .await
            .unwrap();

        deregister_volume(&layout, "vol1", &driver).await.unwrap();

        assert!(matches!(
            load_volume(&layout, "vol1", &driver).await,
            Err(BackupStoreError::VolumeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_volume_names() {
        let (layout, driver, _temp_dir) = setup();
        assert!(list_volume_names(&layout, &driver).await.unwrap().is_empty());

        for name in ["vol-b", "vol-a", "vol-c"] {
            register_volume(&layout, &Volume::new(name, "vfs", 1), &driver)
                .await
                .unwrap();
        }

        assert_eq!(
            list_volume_names(&layout, &driver).await.unwrap(),
            vec!["vol-a", "vol-b", "vol-c"]
        );
    }

    #[tokio::test]
    async fn test_save_volume_overwrites() {
        let (layout, driver, _temp_dir) = setup();
        let mut volume = Volume::new("vol1", "vfs", 1);
        register_volume(&layout, &volume, &driver).await.unwrap();

        volume.last_backup_name = "backup-1".to_string();
        save_volume(&layout, &volume, &driver).await.unwrap();

        let loaded = load_volume(&layout, "vol1", &driver).await.unwrap();
        assert_eq!(loaded.last_backup_name, "backup-1");
    }

    #[tokio::test]
    async fn test_save_volume_keeps_owning_driver() {
        let (layout, driver, _temp_dir) = setup();
        let owned = Volume::new("vol1", "driverA", 1024);
        register_volume(&layout, &owned, &driver).await.unwrap();

        let mut takeover = owned.clone();
        takeover.driver = "driverB".to_string();
        takeover.last_backup_name = "backup-1".to_string();

        let result = save_volume(&layout, &takeover, &driver).await;
        assert!(matches!(
            result,
            Err(BackupStoreError::DriverMismatch { ref stored, ref requested, .. })
                if stored == "driverA" && requested == "driverB"
        ));

        let loaded = load_volume(&layout, "vol1", &driver).await.unwrap();
        assert_eq!(loaded.driver, "driverA");
        assert_eq!(loaded, owned);
    }

    #[tokio::test]
    async fn test_save_unregistered_volume_creates_record() {
        let (layout, driver, _temp_dir) = setup();
        let volume = Volume::new("vol1", "vfs", 1);

        save_volume(&layout, &volume, &driver).await.unwrap();

        assert_eq!(load_volume(&layout, "vol1", &driver).await.unwrap(), volume);
    }
}
