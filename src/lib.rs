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

// Backup metadata store for block-storage volumes
//
// Keeps the metadata describing volumes and their backups on pluggable
// storage drivers:
// - Registers and removes volume records
// - Reads backup records written by the backup-producing workflow
// - Encodes/decodes the backup URL that identifies a backup externally
// - Lists backups across volumes, filtered by owning driver

pub mod backup;
pub mod backup_url;
pub mod config;
pub mod driver;
pub mod error;
pub mod model;
pub mod naming;
mod record;
pub mod store;
pub mod volume;

// Re-export main types
pub use backup_url::{decode_backup_url, encode_backup_url};
pub use config::{load_config, load_config_with_env, BackupStoreConfig};
pub use driver::{BackupStoreDriver, DriverResolver, FilesystemDriver, S3Driver};
pub use error::{BackupStoreError, Result};
pub use model::{Backup, BackupContent, BackupFile, BackupInfo, BlockMapping, Snapshot, Volume};
pub use naming::{is_valid_name, StoreLayout};
pub use store::{BackupListing, BackupStore};
