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

// S3-compatible object store driver
//
// Talks to AWS S3 or any S3-compatible endpoint with reqwest and manual
// AWS Signature V4 signing. Objects are addressed path-style:
// `{endpoint}/{bucket}/{prefix}/{path}`.

use super::backend::BackupStoreDriver;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

/// Resolved settings for one bucket/prefix destination
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub prefix: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub timeout_seconds: u64,
}

pub struct S3Driver {
    settings: S3Settings,
    endpoint: String,
    host: String,
    client: Client,
}

impl S3Driver {
    pub fn new(settings: S3Settings) -> Result<Self> {
        if settings.bucket.is_empty() {
            bail!("S3 destination has no bucket");
        }
        if settings.access_key_id.is_empty() || settings.secret_access_key.is_empty() {
            bail!("S3 credentials not configured for bucket '{}'", settings.bucket);
        }

        let endpoint = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", settings.region))
            .trim_end_matches('/')
            .to_string();
        let host = url_host(&endpoint)?;

        let client = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        info!(
            "Initializing s3 driver for bucket '{}' at {}",
            settings.bucket, endpoint
        );

        Ok(Self {
            settings,
            endpoint,
            host,
            client,
        })
    }

    /// Object key for a store path, including the destination prefix
    fn key(&self, path: &str) -> String {
        let prefix = self.settings.prefix.trim_matches('/');
        let path = path.trim_start_matches('/');
        if prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", prefix, path)
        }
    }

    /// Send a signed request against `/{bucket}/{key}` with the given query
    async fn send(
        &self,
        method: Method,
        key: &str,
        query: &BTreeMap<String, String>,
        body: Bytes,
    ) -> Result<reqwest::Response> {
        let now = Utc::now();
        let date_time = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let canonical_uri = canonical_uri(&self.settings.bucket, key);
        let canonical_query = canonical_query(query);
        let payload_hash = hex::encode(Sha256::digest(&body));

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), self.host.clone());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        headers.insert("x-amz-date".to_string(), date_time.clone());

        let authorization = self.authorization(
            method.as_str(),
            &canonical_uri,
            &canonical_query,
            &headers,
            &payload_hash,
            &date_time,
            &date,
        )?;

        let mut url = format!("{}{}", self.endpoint, canonical_uri);
        if !canonical_query.is_empty() {
            url.push('?');
            url.push_str(&canonical_query);
        }

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("x-amz-date", &date_time)
            .header("x-amz-content-sha256", &payload_hash)
            .header("Authorization", authorization);
        if method == Method::PUT {
            request = request.header("Content-Type", "application/octet-stream");
        }

        request
            .body(body)
            .send()
            .await
            .context(format!("S3 {} request failed", method))
    }

    #[allow(clippy::too_many_arguments)]
    fn authorization(
        &self,
        method: &str,
        canonical_uri: &str,
        canonical_query: &str,
        headers: &BTreeMap<String, String>,
        payload_hash: &str,
        date_time: &str,
        date: &str,
    ) -> Result<String> {
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();
        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, canonical_uri, canonical_query, canonical_headers, signed_headers, payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date, self.settings.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            date_time,
            credential_scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key =
            derive_signing_key(&self.settings.secret_access_key, date, &self.settings.region)?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        Ok(format!(
            "AWS4-HMAC-SHA256 Credential={}/{},SignedHeaders={},Signature={}",
            self.settings.access_key_id, credential_scope, signed_headers, signature
        ))
    }

    /// ListObjectsV2 over `prefix`, following continuation tokens
    ///
    /// Returns `(keys, common_prefixes)`.
    async fn list_objects(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let mut keys = Vec::new();
        let mut prefixes = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut query = BTreeMap::new();
            query.insert("list-type".to_string(), "2".to_string());
            query.insert("prefix".to_string(), prefix.to_string());
            if let Some(delimiter) = delimiter {
                query.insert("delimiter".to_string(), delimiter.to_string());
            }
            if let Some(token) = &continuation {
                query.insert("continuation-token".to_string(), token.clone());
            }

            let response = self.send(Method::GET, "", &query, Bytes::new()).await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                bail!("S3 LIST failed: HTTP {} - {}", status, body);
            }
            let body = response
                .text()
                .await
                .context("Failed to read S3 list response")?;

            let page = ListPage::parse(&body);
            keys.extend(page.keys);
            prefixes.extend(page.common_prefixes);

            match page.next_token {
                Some(token) if page.truncated => continuation = Some(token),
                _ => break,
            }
        }

        Ok((keys, prefixes))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let response = self
            .send(Method::DELETE, key, &BTreeMap::new(), Bytes::new())
            .await?;
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("S3 DELETE of '{}' failed: HTTP {} - {}", key, status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl BackupStoreDriver for S3Driver {
    fn kind(&self) -> &str {
        "s3"
    }

    fn url(&self) -> String {
        let prefix = self.settings.prefix.trim_matches('/');
        format!(
            "s3://{}@{}/{}",
            self.settings.bucket, self.settings.region, prefix
        )
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        let key = self.key(path);
        let response = self
            .send(Method::HEAD, &key, &BTreeMap::new(), Bytes::new())
            .await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => bail!("S3 HEAD of '{}' failed: HTTP {}", key, status),
        }
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let key = self.key(path);
        let response = self
            .send(Method::GET, &key, &BTreeMap::new(), Bytes::new())
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("S3 GET of '{}' failed: HTTP {} - {}", key, status, body);
        }
        response
            .bytes()
            .await
            .context("Failed to read S3 response body")
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        let key = self.key(path);
        let len = data.len();
        let response = self.send(Method::PUT, &key, &BTreeMap::new(), data).await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("S3 PUT of '{}' failed: HTTP {} - {}", key, status, body);
        }
        debug!(key = %key, bytes = len, "S3 upload complete");
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let mut prefix = self.key(path);
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }

        let (keys, prefixes) = self.list_objects(&prefix, Some("/")).await?;
        let mut names: Vec<String> = keys
            .iter()
            .chain(prefixes.iter())
            .filter_map(|entry| entry.strip_prefix(prefix.as_str()))
            .map(|name| name.trim_end_matches('/').to_string())
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let key = self.key(path);
        let dir_prefix = if key.ends_with('/') {
            key.clone()
        } else {
            self.delete_object(&key).await?;
            format!("{}/", key)
        };

        let (keys, _) = self.list_objects(&dir_prefix, None).await?;
        for object in &keys {
            self.delete_object(object).await?;
        }
        debug!(prefix = %dir_prefix, objects = keys.len(), "S3 remove complete");
        Ok(())
    }
}

/// Fields of interest from a ListObjectsV2 response body
#[derive(Debug, Default)]
struct ListPage {
    keys: Vec<String>,
    common_prefixes: Vec<String>,
    truncated: bool,
    next_token: Option<String>,
}

impl ListPage {
    fn parse(xml: &str) -> Self {
        let keys = xml_blocks(xml, "Contents")
            .into_iter()
            .flat_map(|block| xml_blocks(block, "Key"))
            .map(xml_unescape)
            .collect();
        let common_prefixes = xml_blocks(xml, "CommonPrefixes")
            .into_iter()
            .flat_map(|block| xml_blocks(block, "Prefix"))
            .map(xml_unescape)
            .collect();
        let truncated = xml_blocks(xml, "IsTruncated")
            .first()
            .is_some_and(|v| v.trim() == "true");
        let next_token = xml_blocks(xml, "NextContinuationToken")
            .first()
            .map(|v| xml_unescape(v));

        Self {
            keys,
            common_prefixes,
            truncated,
            next_token,
        }
    }
}

/// Inner text of every `<tag>...</tag>` element in `xml`
fn xml_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut remaining = xml;
    while let Some(start) = remaining.find(&open) {
        remaining = &remaining[start + open.len()..];
        match remaining.find(&close) {
            Some(end) => {
                blocks.push(&remaining[..end]);
                remaining = &remaining[end + close.len()..];
            }
            None => break,
        }
    }
    blocks
}

fn xml_unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// `/{bucket}/{key}` with every segment URI-encoded
fn canonical_uri(bucket: &str, key: &str) -> String {
    let mut uri = format!("/{}", urlencoding::encode(bucket));
    if !key.is_empty() {
        uri.push('/');
        let encoded: Vec<_> = key.split('/').map(|s| urlencoding::encode(s)).collect();
        uri.push_str(&encoded.join("/"));
    } else {
        uri.push('/');
    }
    uri
}

/// Query string sorted by key with encoded keys and values
fn canonical_query(query: &BTreeMap<String, String>) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn derive_signing_key(secret: &str, date: &str, region: &str) -> Result<Vec<u8>> {
    let key = format!("AWS4{}", secret);
    let k_date = hmac_sha256(key.as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, b"s3")?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).context("Invalid HMAC key")?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// `host[:port]` of an endpoint URL, as signed in the `host` header
fn url_host(endpoint: &str) -> Result<String> {
    let parsed = url::Url::parse(endpoint)
        .context(format!("Invalid S3 endpoint: {}", endpoint))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("S3 endpoint has no host: {}", endpoint))?;
    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
