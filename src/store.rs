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

// Store handle and listing/query operations

use crate::backup;
use crate::backup_url::{decode_backup_url, encode_backup_url};
use crate::config::BackupStoreConfig;
use crate::driver::{BackupStoreDriver, DriverResolver};
use crate::error::Result;
use crate::model::{Backup, BackupInfo, Volume};
use crate::naming::{validate_volume_name, StoreLayout};
use crate::volume;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Backups keyed by their backup URL
pub type BackupListing = BTreeMap<String, BackupInfo>;

/// Entry point to the backup metadata store.
///
/// Holds the path layout and driver resolver; create one per process (or per
/// test) and share it by reference.
#[derive(Clone)]
pub struct BackupStore {
    layout: StoreLayout,
    resolver: DriverResolver,
}

impl BackupStore {
    pub fn new(config: &BackupStoreConfig) -> Self {
        Self {
            layout: StoreLayout::new(config.store.root.clone()),
            resolver: DriverResolver::new(config.drivers.clone()),
        }
    }

    pub fn with_layout(layout: StoreLayout, resolver: DriverResolver) -> Self {
        Self { layout, resolver }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn resolver(&self) -> &DriverResolver {
        &self.resolver
    }

    /// Driver serving `destination` (a destination or a backup URL)
    pub fn driver(&self, destination: &str) -> Result<Arc<dyn BackupStoreDriver>> {
        self.resolver.resolve(destination)
    }

    pub async fn register_volume(&self, volume: &Volume, driver: &dyn BackupStoreDriver) -> Result<()> {
        volume::register_volume(&self.layout, volume, driver).await
    }

    pub async fn deregister_volume(&self, volume_name: &str, driver: &dyn BackupStoreDriver) -> Result<()> {
        volume::deregister_volume(&self.layout, volume_name, driver).await
    }

    pub async fn load_volume(&self, volume_name: &str, driver: &dyn BackupStoreDriver) -> Result<Volume> {
        volume::load_volume(&self.layout, volume_name, driver).await
    }

    pub async fn save_volume(&self, volume: &Volume, driver: &dyn BackupStoreDriver) -> Result<()> {
        volume::save_volume(&self.layout, volume, driver).await
    }

    pub async fn volume_exists(&self, volume_name: &str, driver: &dyn BackupStoreDriver) -> Result<bool> {
        volume::volume_exists(&self.layout, volume_name, driver).await
    }

    pub async fn list_volume_names(&self, driver: &dyn BackupStoreDriver) -> Result<Vec<String>> {
        volume::list_volume_names(&self.layout, driver).await
    }

    pub async fn load_backup(
        &self,
        backup_name: &str,
        volume_name: &str,
        driver: &dyn BackupStoreDriver,
    ) -> Result<Backup> {
        backup::load_backup(&self.layout, backup_name, volume_name, driver).await
    }

    pub async fn save_backup(&self, backup: &Backup, driver: &dyn BackupStoreDriver) -> Result<()> {
        backup::save_backup(&self.layout, backup, driver).await
    }

    pub async fn backup_exists(
        &self,
        backup_name: &str,
        volume_name: &str,
        driver: &dyn BackupStoreDriver,
    ) -> Result<bool> {
        backup::backup_exists(&self.layout, backup_name, volume_name, driver).await
    }

    pub async fn list_backup_names(
        &self,
        volume_name: &str,
        driver: &dyn BackupStoreDriver,
    ) -> Result<Vec<String>> {
        backup::list_backup_names(&self.layout, volume_name, driver).await
    }

    /// List backups at `destination` owned by `owner_driver`.
    ///
    /// With a volume name only that volume is listed; with `None` (or an empty
    /// name) every volume at the destination is. Volumes whose `driver` differs
    /// from `owner_driver` are skipped. Any unreadable record aborts the whole
    /// listing.
    pub async fn list(
        &self,
        volume_name: Option<&str>,
        destination: &str,
        owner_driver: &str,
    ) -> Result<BackupListing> {
        let driver = self.driver(destination)?;
        let mut listing = BackupListing::new();

        match volume_name.filter(|name| !name.is_empty()) {
            Some(volume_name) => {
                self.add_volume_to_listing(&mut listing, volume_name, driver.as_ref(), owner_driver)
                    .await?;
            }
            None => {
                for volume_name in self.list_volume_names(driver.as_ref()).await? {
                    self.add_volume_to_listing(&mut listing, &volume_name, driver.as_ref(), owner_driver)
                        .await?;
                }
            }
        }

        debug!(
            "Listed {} backups at {} for driver {}",
            listing.len(),
            destination,
            owner_driver
        );
        Ok(listing)
    }

    async fn add_volume_to_listing(
        &self,
        listing: &mut BackupListing,
        volume_name: &str,
        driver: &dyn BackupStoreDriver,
        owner_driver: &str,
    ) -> Result<()> {
        validate_volume_name(volume_name)?;

        let volume = self.load_volume(volume_name, driver).await?;
        if volume.driver != owner_driver {
            debug!(
                "Skipping volume {} owned by driver {}",
                volume_name, volume.driver
            );
            return Ok(());
        }

        let destination = driver.url();
        for backup_name in self.list_backup_names(volume_name, driver).await? {
            let backup = self.load_backup(&backup_name, volume_name, driver).await?;
            let info = project(&backup, &volume, &destination);
            listing.insert(info.backup_url.clone(), info);
        }
        Ok(())
    }

    /// Flat record of the backup a backup URL points at
    pub async fn get_backup_info(&self, backup_url: &str) -> Result<BackupInfo> {
        let driver = self.driver(backup_url)?;
        let (backup_name, volume_name) = decode_backup_url(backup_url)?;

        let volume = self.load_volume(&volume_name, driver.as_ref()).await?;
        let backup = self
            .load_backup(&backup_name, &volume_name, driver.as_ref())
            .await?;
        Ok(project(&backup, &volume, &driver.url()))
    }

    /// Volume record owning the backup a backup URL points at
    pub async fn get_volume(&self, backup_url: &str) -> Result<Volume> {
        let driver = self.driver(backup_url)?;
        let (_, volume_name) = decode_backup_url(backup_url)?;
        self.load_volume(&volume_name, driver.as_ref()).await
    }
}

fn project(backup: &Backup, volume: &Volume, destination: &str) -> BackupInfo {
    let url = encode_backup_url(&backup.name, &backup.volume_name, destination);
    BackupInfo::new(backup, volume, url)
}
