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

// Configuration types for backupstore

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackupStoreConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub drivers: DriversConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Prefix every metadata path is placed under
    #[serde(default = "default_root")]
    pub root: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

/// Per-scheme driver settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DriversConfig {
    #[serde(default)]
    pub nfs: NfsConfig,
    #[serde(default)]
    pub s3: S3Config,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NfsConfig {
    /// Exports are expected at `<mount_root>/<host>/<export path>`
    #[serde(default = "default_mount_root")]
    pub mount_root: String,
}

impl Default for NfsConfig {
    fn default() -> Self {
        Self {
            mount_root: default_mount_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Config {
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible services (MinIO, B2, ...)
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            timeout_seconds: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,  // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String,  // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_root() -> String { crate::naming::DEFAULT_ROOT.to_string() }
fn default_mount_root() -> String { "/var/lib/backupstore/nfs".to_string() }
fn default_region() -> String { "us-east-1".to_string() }
fn default_timeout() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
