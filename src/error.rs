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

// Error taxonomy for backupstore operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackupStoreError>;

#[derive(Debug, Error)]
pub enum BackupStoreError {
    /// A volume or backup name failed the name predicate. Raised before any I/O.
    #[error("invalid {kind} name '{name}'")]
    InvalidName { kind: &'static str, name: String },

    #[error("volume '{0}' doesn't exist in backupstore")]
    VolumeNotFound(String),

    #[error("backup '{backup}' of volume '{volume}' doesn't exist in backupstore")]
    BackupNotFound { backup: String, volume: String },

    /// A volume record exists under another owning driver.
    #[error("volume '{volume}' belongs to driver '{stored}', cannot save it for driver '{requested}'")]
    DriverMismatch {
        volume: String,
        stored: String,
        requested: String,
    },

    /// Malformed backup URL, or invalid names embedded in it.
    #[error("cannot decode backup URL '{url}': {reason}")]
    Decode { url: String, reason: String },

    #[error("unsupported destination '{destination}': {reason}")]
    UnsupportedDestination { destination: String, reason: String },

    #[error("cannot (de)serialize record at '{path}': {source}")]
    Serialization {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Opaque failure from the storage driver, passed through unmodified.
    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

impl BackupStoreError {
    pub fn invalid_volume_name(name: &str) -> Self {
        Self::InvalidName {
            kind: "volume",
            name: name.to_string(),
        }
    }

    pub fn invalid_backup_name(name: &str) -> Self {
        Self::InvalidName {
            kind: "backup",
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BackupStoreError::VolumeNotFound(_) | BackupStoreError::BackupNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(BackupStoreError::VolumeNotFound("vol1".into()).is_not_found());
        assert!(BackupStoreError::BackupNotFound {
            backup: "b".into(),
            volume: "v".into()
        }
        .is_not_found());
        assert!(!BackupStoreError::invalid_volume_name("../x").is_not_found());
    }

    #[test]
    fn test_driver_error_is_transparent() {
        let err: BackupStoreError = anyhow::anyhow!("S3 GET failed: HTTP 500").into();
        assert_eq!(err.to_string(), "S3 GET failed: HTTP 500");
    }

    #[test]
    fn test_driver_mismatch_message() {
        let err = BackupStoreError::DriverMismatch {
            volume: "vol1".into(),
            stored: "vfs".into(),
            requested: "nfs".into(),
        };
        assert_eq!(
            err.to_string(),
            "volume 'vol1' belongs to driver 'vfs', cannot save it for driver 'nfs'"
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_invalid_name_message() {
        let err = BackupStoreError::invalid_backup_name("bad/name");
        assert_eq!(err.to_string(), "invalid backup name 'bad/name'");
    }
}
