// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! HTTP object server backend
//!
//! Objects are addressed as `{base_url}/{locator}`: `GET` reads, `PUT`
//! writes and `DELETE` removes. The write is confirmed by any 2xx status.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use url::Url;

use media_migration_types::StorageType;

use crate::signing::object_url;
use crate::{SignedUrl, StorageAdapter, StorageError, UrlSigner, join_locator};

/// Storage backend talking to an HTTP object server
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: Url,
    signer: Option<UrlSigner>,
}

impl HttpStore {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, StorageError> {
        // reqwest is built without a bundled provider; a second install is a no-op
        let _ = rustls::crypto::ring::default_provider().install_default();

        let client = Client::builder().timeout(timeout).build()?;

        // Validates that segments can be appended to the base
        object_url(&base_url, "check")?;

        Ok(Self {
            client,
            base_url,
            signer: None,
        })
    }

    pub fn with_signer(mut self, signer: UrlSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    fn check_status(status: StatusCode, locator: &str) -> Result<(), StorageError> {
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(locator.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                locator: locator.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for HttpStore {
    fn storage_type(&self) -> StorageType {
        StorageType::Http
    }

    async fn download(&self, locator: &str) -> Result<Bytes, StorageError> {
        let url = object_url(&self.base_url, locator)?;

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            tracing::debug!(url = %url, error = %e, "HTTP request failed");
            StorageError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = %status, "HTTP error response");
        }
        Self::check_status(status, locator)?;

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk?);
        }

        Ok(body.freeze())
    }

    async fn upload(
        &self,
        path_segments: &[String],
        file_name: &str,
        data: Bytes,
    ) -> Result<String, StorageError> {
        let locator = join_locator(path_segments, file_name)?;
        let url = object_url(&self.base_url, &locator)?;
        let len = data.len();

        let response = self.client.put(url.clone()).body(data).send().await?;
        Self::check_status(response.status(), &locator)?;

        tracing::debug!(url = %url, bytes = len, "Stored object on object server");
        Ok(locator)
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        let url = object_url(&self.base_url, locator)?;
        let response = self.client.delete(url).send().await?;
        Self::check_status(response.status(), locator)
    }

    async fn sign(&self, locator: &str, ttl: Duration) -> Result<SignedUrl, StorageError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            StorageError::Unsupported("http backend has no signing_key configured".to_string())
        })?;
        signer.sign(locator, ttl)
    }
}
