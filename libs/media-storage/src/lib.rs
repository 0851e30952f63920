// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Storage adapters for media objects
//!
//! Every backend implements the same [`StorageAdapter`] capability contract
//! (download, upload, delete, sign). Concrete backends are selected through
//! the closed [`StorageBackend`] enum, built from a [`BackendConfig`], so a
//! new backend is a compile-checked addition rather than a new integer code.
//!
//! # Modules
//!
//! - [`local`] - Objects stored under a root directory on local disk
//! - [`http`] - Objects served by an HTTP object server
//! - [`signing`] - Time-limited signed URLs

pub mod http;
pub mod local;
pub mod signing;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use media_migration_types::StorageType;

pub use http::HttpStore;
pub use local::LocalStore;
pub use signing::{SignedUrl, UrlSigner};

/// Default per-request timeout for the HTTP backend
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {status} for {locator}")]
    Status { status: u16, locator: String },
    #[error("Operation not supported: {0}")]
    Unsupported(String),
    #[error("Invalid backend configuration: {0}")]
    Config(String),
}

/// Capability contract shared by every storage backend.
///
/// A locator is an opaque, backend-relative reference to an object. Both
/// shipped backends use `/`-separated relative paths.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// The kind of backend, as recorded in the catalog.
    fn storage_type(&self) -> StorageType;

    /// Fetch the full contents of an object.
    async fn download(&self, locator: &str) -> Result<Bytes, StorageError>;

    /// Store `data` at `path_segments/file_name` and return its locator.
    ///
    /// The returned locator is only produced once the backend has confirmed
    /// the write.
    async fn upload(
        &self,
        path_segments: &[String],
        file_name: &str,
        data: Bytes,
    ) -> Result<String, StorageError>;

    /// Remove an object.
    async fn delete(&self, locator: &str) -> Result<(), StorageError>;

    /// Produce a time-limited URL for an object.
    async fn sign(&self, locator: &str, ttl: Duration) -> Result<SignedUrl, StorageError>;
}

/// Split a locator into validated path segments.
///
/// Rejects empty locators, absolute paths, backslashes and `.`/`..`
/// components so a locator can never escape the backend's namespace.
pub fn locator_segments(locator: &str) -> Result<Vec<&str>, StorageError> {
    if locator.is_empty() || locator.starts_with('/') || locator.contains('\\') {
        return Err(StorageError::InvalidLocator(locator.to_string()));
    }

    let segments: Vec<&str> = locator.split('/').collect();
    for segment in &segments {
        if segment.is_empty()
            || *segment == "."
            || *segment == ".."
            || segment.chars().any(char::is_control)
        {
            return Err(StorageError::InvalidLocator(locator.to_string()));
        }
    }

    Ok(segments)
}

/// Build and validate the locator for `path_segments/file_name`.
pub fn join_locator(path_segments: &[String], file_name: &str) -> Result<String, StorageError> {
    let mut parts: Vec<&str> = path_segments.iter().map(String::as_str).collect();
    parts.push(file_name);
    let locator = parts.join("/");
    locator_segments(&locator)?;
    Ok(locator)
}

/// Configuration of a single backend.
///
/// Serialized with an internal `type` tag, e.g.
/// `{"type": "local", "root": "/var/media"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Local {
        /// Directory holding the objects
        root: PathBuf,
        /// Public URL the root directory is served under (enables signing)
        #[serde(default)]
        public_base_url: Option<Url>,
        #[serde(default)]
        signing_key: Option<String>,
    },
    Http {
        /// Base URL of the object server
        base_url: Url,
        #[serde(default = "default_http_timeout_secs")]
        timeout_secs: u64,
        #[serde(default)]
        signing_key: Option<String>,
    },
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl BackendConfig {
    pub fn storage_type(&self) -> StorageType {
        match self {
            BackendConfig::Local { .. } => StorageType::Local,
            BackendConfig::Http { .. } => StorageType::Http,
        }
    }

    /// A short description safe for logs (no signing keys).
    pub fn describe(&self) -> String {
        match self {
            BackendConfig::Local { root, .. } => format!("local:{}", root.display()),
            BackendConfig::Http { base_url, .. } => format!("http:{}", base_url),
        }
    }
}

/// Closed set of storage backends.
pub enum StorageBackend {
    Local(LocalStore),
    Http(HttpStore),
}

impl StorageBackend {
    /// Build the backend described by `config`.
    pub fn from_config(config: &BackendConfig) -> Result<Self, StorageError> {
        match config {
            BackendConfig::Local {
                root,
                public_base_url,
                signing_key,
            } => {
                let mut store = LocalStore::new(root.clone());
                match (public_base_url, signing_key) {
                    (Some(url), Some(key)) => {
                        store = store.with_signer(UrlSigner::new(url.clone(), key.clone())?);
                    }
                    (None, None) => {}
                    _ => {
                        return Err(StorageError::Config(
                            "local backend signing needs both public_base_url and signing_key"
                                .to_string(),
                        ));
                    }
                }
                Ok(StorageBackend::Local(store))
            }
            BackendConfig::Http {
                base_url,
                timeout_secs,
                signing_key,
            } => {
                let mut store =
                    HttpStore::new(base_url.clone(), Duration::from_secs(*timeout_secs))?;
                if let Some(key) = signing_key {
                    store = store.with_signer(UrlSigner::new(base_url.clone(), key.clone())?);
                }
                Ok(StorageBackend::Http(store))
            }
        }
    }
}

#[async_trait]
impl StorageAdapter for StorageBackend {
    fn storage_type(&self) -> StorageType {
        match self {
            StorageBackend::Local(s) => s.storage_type(),
            StorageBackend::Http(s) => s.storage_type(),
        }
    }

    async fn download(&self, locator: &str) -> Result<Bytes, StorageError> {
        match self {
            StorageBackend::Local(s) => s.download(locator).await,
            StorageBackend::Http(s) => s.download(locator).await,
        }
    }

    async fn upload(
        &self,
        path_segments: &[String],
        file_name: &str,
        data: Bytes,
    ) -> Result<String, StorageError> {
        match self {
            StorageBackend::Local(s) => s.upload(path_segments, file_name, data).await,
            StorageBackend::Http(s) => s.upload(path_segments, file_name, data).await,
        }
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        match self {
            StorageBackend::Local(s) => s.delete(locator).await,
            StorageBackend::Http(s) => s.delete(locator).await,
        }
    }

    async fn sign(&self, locator: &str, ttl: Duration) -> Result<SignedUrl, StorageError> {
        match self {
            StorageBackend::Local(s) => s.sign(locator, ttl).await,
            StorageBackend::Http(s) => s.sign(locator, ttl).await,
        }
    }
}
