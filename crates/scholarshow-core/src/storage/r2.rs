//! Cloudflare R2 object store.

use std::env;

use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream, Client};
use aws_types::region::Region;
use serde::{Deserialize, Serialize};

use super::ObjectStore;
use crate::error::{Error, Result};
use crate::util::is_http_url;

const ENV_ACCOUNT_ID: &str = "R2_ACCOUNT_ID";
const ENV_BUCKET: &str = "R2_BUCKET";
const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
const ENV_PUBLIC_BASE_URL: &str = "R2_PUBLIC_BASE_URL";

/// Cloudflare R2 configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct R2Config {
    pub account_id: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Public URL base that serves the bucket's objects.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl std::fmt::Debug for R2Config {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("R2Config")
            .field("account_id", &self.account_id)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl R2Config {
    /// Load R2 configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no R2 variables are set and an error when only
    /// some of them are.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`R2Config::from_env`] over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        parse_config(lookup)
    }

    /// Cloudflare R2 S3-compatible endpoint URL.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }

    /// Check required values and normalize the public base URL.
    pub fn validated(self) -> Result<Self> {
        let values = [
            (ENV_ACCOUNT_ID, Some(self.account_id)),
            (ENV_BUCKET, Some(self.bucket)),
            (ENV_ACCESS_KEY_ID, Some(self.access_key_id)),
            (ENV_SECRET_ACCESS_KEY, Some(self.secret_access_key)),
            (ENV_PUBLIC_BASE_URL, self.public_base_url),
        ];
        let map: std::collections::HashMap<_, _> = values
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect();
        parse_config(|key| map.get(key).cloned())?
            .ok_or_else(|| Error::Invalid("R2 configuration is empty".to_string()))
    }
}

/// [`ObjectStore`] writing to an R2 bucket through the S3 API.
#[derive(Clone)]
pub struct R2ObjectStore {
    config: R2Config,
    client: Client,
}

impl R2ObjectStore {
    #[must_use]
    pub fn new(config: R2Config) -> Self {
        let client = build_s3_client(&config);
        Self { config, client }
    }

    #[must_use]
    pub const fn config(&self) -> &R2Config {
        &self.config
    }

    /// Public URL for an object key.
    ///
    /// Falls back to the path-style endpoint URL when no public base is set.
    pub fn public_object_url(&self, object_key: &str) -> String {
        let key = object_key.trim_matches('/');
        self.config.public_base_url.as_ref().map_or_else(
            || format!("{}/{}/{key}", self.config.endpoint_url(), self.config.bucket),
            |base| format!("{base}/{key}"),
        )
    }
}

impl ObjectStore for R2ObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String> {
        let object_key = normalize_object_key(path)?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = normalize_content_type(content_type) {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|error| {
            storage_error("put_object", &self.config.bucket, &object_key, error)
        })?;
        tracing::debug!("Uploaded {} to R2 bucket {}", object_key, self.config.bucket);

        Ok(self.public_object_url(&object_key))
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<R2Config>> {
    let read = |key: &str| lookup(key).map(|value: String| value.trim().to_string());
    let account_id = read(ENV_ACCOUNT_ID);
    let bucket = read(ENV_BUCKET);
    let access_key_id = read(ENV_ACCESS_KEY_ID);
    let secret_access_key = read(ENV_SECRET_ACCESS_KEY);
    let public_base_url = read(ENV_PUBLIC_BASE_URL);

    let any_present = account_id.is_some()
        || bucket.is_some()
        || access_key_id.is_some()
        || secret_access_key.is_some()
        || public_base_url.is_some();
    if !any_present {
        return Ok(None);
    }

    let required = |value: Option<String>| value.filter(|value| !value.is_empty());
    let (account_id, bucket, access_key_id, secret_access_key) = (
        required(account_id),
        required(bucket),
        required(access_key_id),
        required(secret_access_key),
    );

    let (Some(account_id), Some(bucket), Some(access_key_id), Some(secret_access_key)) = (
        account_id.clone(),
        bucket.clone(),
        access_key_id.clone(),
        secret_access_key.clone(),
    ) else {
        let missing: Vec<&str> = [
            (ENV_ACCOUNT_ID, account_id.is_none()),
            (ENV_BUCKET, bucket.is_none()),
            (ENV_ACCESS_KEY_ID, access_key_id.is_none()),
            (ENV_SECRET_ACCESS_KEY, secret_access_key.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, is_missing)| is_missing.then_some(key))
        .collect();
        return Err(Error::Invalid(format!(
            "R2 configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    };

    Ok(Some(R2Config {
        account_id,
        bucket,
        access_key_id,
        secret_access_key,
        public_base_url: normalize_public_base_url(public_base_url)?,
    }))
}

fn build_s3_client(config: &R2Config) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "scholarshow-r2",
    );

    let sdk_config = aws_sdk_s3::config::Builder::new()
        .region(Region::new("auto"))
        .credentials_provider(credentials)
        .endpoint_url(config.endpoint_url())
        .force_path_style(true)
        .build();

    Client::from_conf(sdk_config)
}

fn storage_error(operation: &str, bucket: &str, object_key: &str, error: impl std::fmt::Display) -> Error {
    Error::Storage(format!("R2 {operation} failed for {bucket}/{object_key}: {error}"))
}

fn normalize_object_key(object_key: &str) -> Result<String> {
    let object_key = object_key.trim().trim_matches('/').to_string();
    if object_key.is_empty() {
        return Err(Error::Invalid("Object path cannot be empty".to_string()));
    }
    Ok(object_key)
}

fn normalize_content_type(content_type: Option<&str>) -> Option<String> {
    content_type
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn normalize_public_base_url(public_base_url: Option<String>) -> Result<Option<String>> {
    let Some(value) = public_base_url.filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if !is_http_url(&value) {
        return Err(Error::Invalid(
            "R2_PUBLIC_BASE_URL must start with http:// or https://".to_string(),
        ));
    }
    Ok(Some(value.trim_end_matches('/').to_string()))
}
