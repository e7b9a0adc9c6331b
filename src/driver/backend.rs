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

// Storage driver trait for backupstore metadata I/O

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Capability set every storage driver provides
///
/// Paths are `/`-separated keys relative to the driver's destination. A path
/// ending in `/` names a directory (or an object-store prefix).
#[async_trait]
pub trait BackupStoreDriver: Send + Sync {
    /// Driver type identifier ("vfs", "nfs", "s3", ...)
    fn kind(&self) -> &str;

    /// Canonical URL of the destination this driver serves
    fn url(&self) -> String;

    /// Whether a file exists at `path`
    async fn file_exists(&self, path: &str) -> Result<bool>;

    /// Read the whole file at `path`
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Create or replace the file at `path`
    async fn write(&self, path: &str, data: Bytes) -> Result<()>;

    /// Names of the immediate children of directory `path`
    ///
    /// A missing directory lists as empty.
    async fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Remove `path` and everything beneath it
    ///
    /// Removing a path that doesn't exist is not an error.
    async fn remove(&self, path: &str) -> Result<()>;
}
