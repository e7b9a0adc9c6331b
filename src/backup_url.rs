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

// Backup URL codec
//
// A backup URL is the destination with the backup identity appended as
// query parameters: `<destination>?backup=<name>&volume=<volume>`.

use crate::error::{BackupStoreError, Result};
use crate::naming::is_valid_name;
use url::form_urlencoded;
use url::Url;

const BACKUP_PARAM: &str = "backup";
const VOLUME_PARAM: &str = "volume";

/// Build the external URL of `backup_name` in `volume_name` at `destination`
///
/// A query already present on `destination` is kept, minus any `backup` or
/// `volume` parameters, and the backup identity is appended after it.
pub fn encode_backup_url(backup_name: &str, volume_name: &str, destination: &str) -> String {
    let (base, existing) = match destination.split_once('?') {
        Some((base, query)) => (base, query),
        None => (destination, ""),
    };

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(existing.as_bytes()) {
        if key != BACKUP_PARAM && key != VOLUME_PARAM {
            serializer.append_pair(&key, &value);
        }
    }
    let query = serializer
        .append_pair(BACKUP_PARAM, backup_name)
        .append_pair(VOLUME_PARAM, volume_name)
        .finish();
    format!("{}?{}", base, query)
}

/// Parse a backup URL into `(backup_name, volume_name)`
///
/// Both names are re-validated, so a hand-edited URL can never point a lookup
/// outside the volume's metadata directory. A repeated parameter resolves to
/// its first occurrence.
pub fn decode_backup_url(backup_url: &str) -> Result<(String, String)> {
    let url = Url::parse(backup_url).map_err(|e| decode_error(backup_url, e.to_string()))?;

    let mut backup_name = None;
    let mut volume_name = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            BACKUP_PARAM if backup_name.is_none() => backup_name = Some(value.into_owned()),
            VOLUME_PARAM if volume_name.is_none() => volume_name = Some(value.into_owned()),
            _ => {}
        }
    }

    let backup_name = backup_name.unwrap_or_default();
    let volume_name = volume_name.unwrap_or_default();
    if !is_valid_name(&backup_name) || !is_valid_name(&volume_name) {
        return Err(decode_error(
            backup_url,
            format!(
                "invalid name parsed, got backup '{}' and volume '{}'",
                backup_name, volume_name
            ),
        ));
    }

    Ok((backup_name, volume_name))
}

fn decode_error(url: &str, reason: impl Into<String>) -> BackupStoreError {
    BackupStoreError::Decode {
        url: url.to_string(),
        reason: reason.into(),
    }
}
