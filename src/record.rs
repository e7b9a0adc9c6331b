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

// JSON record I/O through a driver

use crate::driver::BackupStoreDriver;
use crate::error::{BackupStoreError, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) async fn load_record<T: DeserializeOwned>(
    driver: &dyn BackupStoreDriver,
    path: &str,
) -> Result<T> {
    let data = driver.read(path).await?;
    serde_json::from_slice(&data).map_err(|source| BackupStoreError::Serialization {
        path: path.to_string(),
        source,
    })
}

pub(crate) async fn save_record<T: Serialize>(
    driver: &dyn BackupStoreDriver,
    path: &str,
    record: &T,
) -> Result<()> {
    let data = serde_json::to_vec(record).map_err(|source| BackupStoreError::Serialization {
        path: path.to_string(),
        source,
    })?;
    driver.write(path, Bytes::from(data)).await?;
    Ok(())
}
