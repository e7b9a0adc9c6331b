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

// Persisted metadata records and the flat projection handed to callers

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Volume record, stored once per volume as `volume.cfg`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    pub name: String,
    /// Owning storage driver; never changes after the record is created.
    pub driver: String,
    #[serde(with = "decimal_string")]
    pub size: i64,
    pub created_time: String,
    #[serde(default)]
    pub last_backup_name: String,
}

impl Volume {
    pub fn new(name: impl Into<String>, driver: impl Into<String>, size: i64) -> Self {
        Self {
            name: name.into(),
            driver: driver.into(),
            size,
            created_time: now(),
            last_backup_name: String::new(),
        }
    }
}

/// Point-in-time marker on a volume that a backup is taken from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Snapshot {
    pub name: String,
    pub created_time: String,
}

impl Snapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_time: now(),
        }
    }
}

/// Reference to a content-addressed block at a volume offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockMapping {
    pub offset: i64,
    pub block_checksum: String,
}

/// Whole-volume backup stored as one opaque blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackupFile {
    pub file_path: String,
}

/// Content of a backup: incremental block list or a single file, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupContent {
    Blocks(Vec<BlockMapping>),
    SingleFile(BackupFile),
}

impl Default for BackupContent {
    fn default() -> Self {
        BackupContent::Blocks(Vec::new())
    }
}

/// Backup record, stored under its volume as `backups/backup_<name>.cfg`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Backup {
    pub name: String,
    pub driver: String,
    pub volume_name: String,
    pub snapshot_name: String,
    pub snapshot_created_at: String,
    pub created_time: String,
    #[serde(with = "decimal_string")]
    pub size: i64,
    #[serde(flatten)]
    pub content: BackupContent,
}

impl Backup {
    /// Start a backup record for `snapshot` of `volume`, stamped with the current time.
    pub fn new(
        name: impl Into<String>,
        volume: &Volume,
        snapshot: &Snapshot,
        size: i64,
        content: BackupContent,
    ) -> Self {
        Self {
            name: name.into(),
            driver: volume.driver.clone(),
            volume_name: volume.name.clone(),
            snapshot_name: snapshot.name.clone(),
            snapshot_created_at: snapshot.created_time.clone(),
            created_time: now(),
            size,
            content,
        }
    }

    pub fn blocks(&self) -> Option<&[BlockMapping]> {
        match &self.content {
            BackupContent::Blocks(blocks) => Some(blocks),
            BackupContent::SingleFile(_) => None,
        }
    }

    pub fn single_file(&self) -> Option<&BackupFile> {
        match &self.content {
            BackupContent::SingleFile(file) => Some(file),
            BackupContent::Blocks(_) => None,
        }
    }
}

/// Flat view of a backup joined with its volume.
///
/// Sizes are carried as decimal text so consumers never lose precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackupInfo {
    pub backup_name: String,
    #[serde(rename = "BackupURL")]
    pub backup_url: String,
    pub driver_name: String,
    pub volume_name: String,
    pub volume_size: String,
    pub volume_created_at: String,
    pub snapshot_name: String,
    pub snapshot_created_at: String,
    pub created_time: String,
    pub size: String,
}

impl BackupInfo {
    pub fn new(backup: &Backup, volume: &Volume, backup_url: String) -> Self {
        Self {
            backup_name: backup.name.clone(),
            backup_url,
            driver_name: volume.driver.clone(),
            volume_name: backup.volume_name.clone(),
            volume_size: volume.size.to_string(),
            volume_created_at: volume.created_time.clone(),
            snapshot_name: backup.snapshot_name.clone(),
            snapshot_created_at: backup.snapshot_created_at.clone(),
            created_time: backup.created_time.clone(),
            size: backup.size.to_string(),
        }
    }

    /// String-keyed record as exposed to the REST layer
    pub fn into_map(self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("BackupName".to_string(), self.backup_name),
            ("BackupURL".to_string(), self.backup_url),
            ("DriverName".to_string(), self.driver_name),
            ("VolumeName".to_string(), self.volume_name),
            ("VolumeSize".to_string(), self.volume_size),
            ("VolumeCreatedAt".to_string(), self.volume_created_at),
            ("SnapshotName".to_string(), self.snapshot_name),
            ("SnapshotCreatedAt".to_string(), self.snapshot_created_at),
            ("CreatedTime".to_string(), self.created_time),
            ("Size".to_string(), self.size),
        ])
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Serialize integers as JSON strings, accepting either form on read
mod decimal_string {
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.parse().map_err(de::Error::custom),
            Repr::Number(n) => Ok(n),
        }
    }
}
