// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Shared fixtures for migration engine tests: an in-memory storage backend
//! with fault injection and a catalog wrapper that records how it is driven.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::Semaphore;

use media_catalog::{
    CatalogError, CatalogItem, CatalogStore, EligibilityFilter, NewCatalogItem, SqliteCatalog,
};
use media_migration_types::{ItemId, MediaKind, PendingSummary, StorageType};
use media_migrator::{EngineSettings, MigrationService};
use media_storage::{SignedUrl, StorageAdapter, StorageError};

// ============================================================================
// In-memory storage backend
// ============================================================================

/// Storage backend holding objects in a map, with knobs for failures and
/// for holding uploads until a test lets them through.
pub struct MemoryStore {
    storage_type: StorageType,
    objects: Mutex<HashMap<String, Bytes>>,
    fail_uploads: Mutex<HashSet<String>>,
    fail_downloads: Mutex<HashSet<String>>,
    panic_downloads: Mutex<HashSet<String>>,
    fail_deletes: AtomicBool,
    upload_gate: Mutex<Option<Arc<Semaphore>>>,
    uploads_started: AtomicUsize,
    uploads: AtomicUsize,
    deletes: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new(storage_type: StorageType) -> Arc<Self> {
        Arc::new(Self {
            storage_type,
            objects: Mutex::new(HashMap::new()),
            fail_uploads: Mutex::new(HashSet::new()),
            fail_downloads: Mutex::new(HashSet::new()),
            panic_downloads: Mutex::new(HashSet::new()),
            fail_deletes: AtomicBool::new(false),
            upload_gate: Mutex::new(None),
            uploads_started: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn put(&self, locator: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(locator.to_string(), Bytes::copy_from_slice(data));
    }

    pub fn get(&self, locator: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(locator).cloned()
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.objects.lock().unwrap().contains_key(locator)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Reject uploads of objects named `file_name`.
    pub fn fail_upload_of(&self, file_name: &str) {
        self.fail_uploads.lock().unwrap().insert(file_name.to_string());
    }

    pub fn clear_upload_failures(&self) {
        self.fail_uploads.lock().unwrap().clear();
    }

    pub fn fail_download_of(&self, locator: &str) {
        self.fail_downloads.lock().unwrap().insert(locator.to_string());
    }

    /// Panic inside `download` for `locator`.
    pub fn panic_on_download_of(&self, locator: &str) {
        self.panic_downloads
            .lock()
            .unwrap()
            .insert(locator.to_string());
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    /// Hold every upload until a permit is added to the returned semaphore.
    pub fn gate_uploads(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.upload_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn uploads_started(&self) -> usize {
        self.uploads_started.load(Ordering::SeqCst)
    }

    /// Uploads that completed successfully
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` uploads have started.
    pub async fn wait_for_uploads_started(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.uploads_started() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("uploads did not start in time");
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageAdapter for MemoryStore {
    fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    async fn download(&self, locator: &str) -> Result<Bytes, StorageError> {
        if self.panic_downloads.lock().unwrap().contains(locator) {
            panic!("injected panic downloading {locator}");
        }
        if self.fail_downloads.lock().unwrap().contains(locator) {
            return Err(StorageError::Status {
                status: 503,
                locator: locator.to_string(),
            });
        }
        self.get(locator)
            .ok_or_else(|| StorageError::NotFound(locator.to_string()))
    }

    async fn upload(
        &self,
        path_segments: &[String],
        file_name: &str,
        data: Bytes,
    ) -> Result<String, StorageError> {
        self.uploads_started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        // Long enough for concurrent uploads to overlap
        tokio::time::sleep(Duration::from_millis(5)).await;

        if self.fail_uploads.lock().unwrap().contains(file_name) {
            return Err(StorageError::Status {
                status: 507,
                locator: file_name.to_string(),
            });
        }

        let mut parts = path_segments.to_vec();
        parts.push(file_name.to_string());
        let locator = parts.join("/");
        self.objects.lock().unwrap().insert(locator.clone(), data);
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(locator)
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Status {
                status: 500,
                locator: locator.to_string(),
            });
        }
        match self.objects.lock().unwrap().remove(locator) {
            Some(_) => {
                self.deletes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(StorageError::NotFound(locator.to_string())),
        }
    }

    async fn sign(&self, locator: &str, _ttl: Duration) -> Result<SignedUrl, StorageError> {
        Err(StorageError::Unsupported(format!("signing {locator}")))
    }
}

// ============================================================================
// Recording catalog
// ============================================================================

/// SQLite catalog that records fetch limits and committed batch sizes, and
/// can be told to fail commits.
pub struct RecordingCatalog {
    inner: SqliteCatalog,
    fetch_limits: Mutex<Vec<u32>>,
    commit_sizes: Mutex<Vec<usize>>,
    fail_commits: AtomicBool,
}

impl RecordingCatalog {
    pub fn new(inner: SqliteCatalog) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fetch_limits: Mutex::new(Vec::new()),
            commit_sizes: Mutex::new(Vec::new()),
            fail_commits: AtomicBool::new(false),
        })
    }

    pub fn fetch_limits(&self) -> Vec<u32> {
        self.fetch_limits.lock().unwrap().clone()
    }

    pub fn commit_sizes(&self) -> Vec<usize> {
        self.commit_sizes.lock().unwrap().clone()
    }

    pub fn fail_commits(&self) {
        self.fail_commits.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.fetch_limits.lock().unwrap().clear();
        self.commit_sizes.lock().unwrap().clear();
    }
}

#[async_trait]
impl CatalogStore for RecordingCatalog {
    async fn count_eligible(
        &self,
        filter: &EligibilityFilter,
    ) -> Result<PendingSummary, CatalogError> {
        self.inner.count_eligible(filter).await
    }

    async fn fetch_batch(
        &self,
        filter: &EligibilityFilter,
        after_id: ItemId,
        limit: u32,
    ) -> Result<Vec<CatalogItem>, CatalogError> {
        self.fetch_limits.lock().unwrap().push(limit);
        self.inner.fetch_batch(filter, after_id, limit).await
    }

    async fn commit_batch(&self, items: &[CatalogItem]) -> Result<(), CatalogError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(CatalogError::Invalid("injected commit failure".to_string()));
        }
        self.commit_sizes.lock().unwrap().push(items.len());
        self.inner.commit_batch(items).await
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A service wired to in-memory backends: `Local` source, `Http` destination.
pub struct Harness {
    pub service: Arc<MigrationService>,
    pub catalog: SqliteCatalog,
    pub recorder: Arc<RecordingCatalog>,
    pub source: Arc<MemoryStore>,
    pub destination: Arc<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let catalog = SqliteCatalog::open_in_memory().expect("open in-memory catalog");
        let recorder = RecordingCatalog::new(catalog.clone());
        let source = MemoryStore::new(StorageType::Local);
        let destination = MemoryStore::new(StorageType::Http);

        let service = MigrationService::new(
            recorder.clone(),
            source.clone(),
            destination.clone(),
            settings,
        )
        .expect("distinct backends");

        Self {
            service: Arc::new(service),
            catalog,
            recorder,
            source,
            destination,
        }
    }

    /// Add `n` images in scope `acme`, stored on the source as
    /// `acme/{i}.jpg` for i in 1..=n. Returns their ids in insertion order.
    pub async fn seed(&self, n: usize) -> Vec<ItemId> {
        let mut ids = Vec::with_capacity(n);
        for i in 1..=n {
            let id = self
                .add_item("acme", MediaKind::Image, &format!("{i}.jpg"))
                .await;
            ids.push(id);
        }
        ids
    }

    /// Add one item on the source backend and store its bytes there.
    pub async fn add_item(&self, scope: &str, kind: MediaKind, file_name: &str) -> ItemId {
        let locator = format!("{scope}/{file_name}");
        let data = format!("contents of {locator}");
        self.source.put(&locator, data.as_bytes());
        self.catalog
            .insert(&NewCatalogItem {
                scope: scope.to_string(),
                kind,
                storage_type: StorageType::Local,
                locator,
                file_name: file_name.to_string(),
                size: data.len() as u64,
                owner_name: None,
                subject_name: None,
                created_at: Utc::now(),
            })
            .await
            .expect("insert catalog item")
    }

    pub async fn item(&self, id: ItemId) -> CatalogItem {
        self.catalog.get(id).await.expect("catalog item")
    }
}
