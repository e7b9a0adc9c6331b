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

// Name validation and the on-store path scheme
//
// Layout under the configured root:
//
//   <root>/volumes/<h[0..2]>/<h[2..4]>/<volume>/volume.cfg
//   <root>/volumes/<h[0..2]>/<h[2..4]>/<volume>/backups/backup_<name>.cfg
//   <root>/volumes/<h[0..2]>/<h[2..4]>/<volume>/blocks/<c[0..2]>/<c[2..4]>/<c>.blk
//
// where `h` is the hex SHA-256 of the volume name and `c` a block checksum.

use crate::error::{BackupStoreError, Result};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

pub const DEFAULT_ROOT: &str = "backupstore";

const VOLUME_DIRECTORY: &str = "volumes";
const VOLUME_CONFIG_FILE: &str = "volume.cfg";
const BACKUP_DIRECTORY: &str = "backups";
const BACKUP_CONFIG_PREFIX: &str = "backup_";
const BLOCK_DIRECTORY: &str = "blocks";
const BLOCK_SUFFIX: &str = ".blk";
const CFG_SUFFIX: &str = ".cfg";

const LAYER1: usize = 2;
const LAYER2: usize = 4;

const MAX_NAME_LEN: usize = 255;

static VALID_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]+$").unwrap());

/// Returns true when `name` is safe to use as a single path component.
pub fn is_valid_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN && VALID_NAME.is_match(name)
}

pub fn validate_volume_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(BackupStoreError::invalid_volume_name(name))
    }
}

pub fn validate_backup_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(BackupStoreError::invalid_backup_name(name))
    }
}

/// Lowercase hex SHA-256 of `data`
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Path scheme rooted at a fixed prefix.
///
/// A layout is immutable once built; a store that needs a different root
/// builds a new layout instead of mutating a shared one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: String,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl StoreLayout {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let root = root.trim_matches('/').to_string();
        Self { root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Directory holding the two hash layers of every volume
    pub fn volumes_dir(&self) -> String {
        self.join(&[VOLUME_DIRECTORY]) + "/"
    }

    pub fn volume_dir(&self, volume_name: &str) -> Result<String> {
        validate_volume_name(volume_name)?;
        let hash = checksum(volume_name.as_bytes());
        Ok(self.join(&[
            VOLUME_DIRECTORY,
            &hash[..LAYER1],
            &hash[LAYER1..LAYER2],
            volume_name,
        ]) + "/")
    }

    pub fn volume_config_path(&self, volume_name: &str) -> Result<String> {
        Ok(self.volume_dir(volume_name)? + VOLUME_CONFIG_FILE)
    }

    pub fn backups_dir(&self, volume_name: &str) -> Result<String> {
        Ok(self.volume_dir(volume_name)? + BACKUP_DIRECTORY + "/")
    }

    pub fn backup_config_path(&self, backup_name: &str, volume_name: &str) -> Result<String> {
        validate_backup_name(backup_name)?;
        Ok(self.backups_dir(volume_name)? + &backup_config_name(backup_name))
    }

    pub fn block_path(&self, volume_name: &str, block_checksum: &str) -> Result<String> {
        if block_checksum.len() < LAYER2 || !block_checksum.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BackupStoreError::InvalidName {
                kind: "block checksum",
                name: block_checksum.to_string(),
            });
        }
        Ok(format!(
            "{}{}/{}/{}/{}{}",
            self.volume_dir(volume_name)?,
            BLOCK_DIRECTORY,
            &block_checksum[..LAYER1],
            &block_checksum[LAYER1..LAYER2],
            block_checksum,
            BLOCK_SUFFIX
        ))
    }

    fn join(&self, parts: &[&str]) -> String {
        let mut path = self.root.clone();
        for part in parts {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(part);
        }
        path
    }
}

fn backup_config_name(backup_name: &str) -> String {
    format!("{}{}{}", BACKUP_CONFIG_PREFIX, backup_name, CFG_SUFFIX)
}

/// Extract the backup name from a `backup_<name>.cfg` file name.
///
/// Entries that don't follow the pattern or carry an invalid name are skipped
/// by returning `None`.
pub fn backup_name_from_config(file_name: &str) -> Option<&str> {
    let name = file_name
        .strip_prefix(BACKUP_CONFIG_PREFIX)?
        .strip_suffix(CFG_SUFFIX)?;
    is_valid_name(name).then_some(name)
}

/// True for a two-character lowercase hex directory name (one hash layer)
pub(crate) fn is_hash_layer(name: &str) -> bool {
    name.len() == LAYER1 && name.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}
