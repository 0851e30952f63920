// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Local disk backend
//!
//! Objects live under a root directory; the locator is the object's
//! `/`-separated path relative to that root.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use media_migration_types::StorageType;

use crate::{SignedUrl, StorageAdapter, StorageError, UrlSigner, join_locator, locator_segments};

/// Storage backend rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    signer: Option<UrlSigner>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            signer: None,
        }
    }

    /// Enable [`StorageAdapter::sign`] for objects served under the signer's base URL.
    pub fn with_signer(mut self, signer: UrlSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Map a locator to its path on disk.
    pub fn path_for(&self, locator: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.root.clone();
        for segment in locator_segments(locator)? {
            path.push(segment);
        }
        Ok(path)
    }

    /// Write to a hidden sibling, flush it to disk, then rename into place so
    /// readers never observe a partial object.
    async fn write_atomically(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = parent.join(format!(".{}.{}.partial", file_name, uuid::Uuid::new_v4()));

        let result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(data).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, path).await
        }
        .await;

        if result.is_err() {
            // Best-effort cleanup; the original error is what matters
            let _ = fs::remove_file(&tmp_path).await;
        }
        result
    }
}

fn map_not_found(e: std::io::Error, locator: &str) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(locator.to_string())
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl StorageAdapter for LocalStore {
    fn storage_type(&self) -> StorageType {
        StorageType::Local
    }

    async fn download(&self, locator: &str) -> Result<Bytes, StorageError> {
        let path = self.path_for(locator)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| map_not_found(e, locator))?;
        Ok(Bytes::from(data))
    }

    async fn upload(
        &self,
        path_segments: &[String],
        file_name: &str,
        data: Bytes,
    ) -> Result<String, StorageError> {
        let locator = join_locator(path_segments, file_name)?;
        let path = self.path_for(&locator)?;

        self.write_atomically(&path, &data).await?;

        tracing::debug!(
            locator = %locator,
            bytes = data.len(),
            "Stored object on local disk"
        );
        Ok(locator)
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        let path = self.path_for(locator)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| map_not_found(e, locator))
    }

    async fn sign(&self, locator: &str, ttl: Duration) -> Result<SignedUrl, StorageError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            StorageError::Unsupported("local backend has no public_base_url configured".to_string())
        })?;
        signer.sign(locator, ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use url::Url;

    #[tokio::test]
    async fn test_upload_then_download() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let locator = store
            .upload(
                &["alice".to_string(), "image".to_string()],
                "1.jpg",
                Bytes::from_static(b"jpeg bytes"),
            )
            .await
            .unwrap();

        assert_eq!(locator, "alice/image/1.jpg");
        assert!(dir.path().join("alice/image/1.jpg").is_file());

        let data = store.download(&locator).await.unwrap();
        assert_eq!(&data[..], b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_upload_leaves_no_partial_files() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        store
            .upload(&["d".to_string()], "f.bin", Bytes::from_static(b"x"))
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path().join("d"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["f.bin".to_string()]);
    }

    #[tokio::test]
    async fn test_upload_overwrites_existing() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        store
            .upload(&[], "f.bin", Bytes::from_static(b"old"))
            .await
            .unwrap();
        store
            .upload(&[], "f.bin", Bytes::from_static(b"new"))
            .await
            .unwrap();

        assert_eq!(&store.download("f.bin").await.unwrap()[..], b"new");
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let result = store.download("nope/missing.jpg").await;
        assert!(matches!(result, Err(StorageError::NotFound(l)) if l == "nope/missing.jpg"));
    }

    #[tokio::test]
    async fn test_locator_cannot_escape_root() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("root"));

        let result = store.download("../secret").await;
        assert!(matches!(result, Err(StorageError::InvalidLocator(_))));

        let result = store
            .upload(&["..".to_string()], "x.bin", Bytes::from_static(b"x"))
            .await;
        assert!(matches!(result, Err(StorageError::InvalidLocator(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let locator = store
            .upload(&["a".to_string()], "b.txt", Bytes::from_static(b"hi"))
            .await
            .unwrap();
        store.delete(&locator).await.unwrap();
        assert!(!dir.path().join("a/b.txt").exists());

        let again = store.delete(&locator).await;
        assert!(matches!(again, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sign_requires_signer() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let result = store.sign("a.jpg", Duration::from_secs(60)).await;
        assert!(matches!(result, Err(StorageError::Unsupported(_))));

        let signer = UrlSigner::new(
            Url::parse("https://media.example.com/files/").unwrap(),
            "key".to_string(),
        )
        .unwrap();
        let store = store.with_signer(signer);
        let signed = store.sign("a.jpg", Duration::from_secs(60)).await.unwrap();
        assert!(
            signed
                .url
                .as_str()
                .starts_with("https://media.example.com/files/a.jpg?expires=")
        );
        assert!(signed.expires_at > chrono::Utc::now());
    }
}
