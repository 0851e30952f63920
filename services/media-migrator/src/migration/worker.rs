// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Per-item transfer
//!
//! A worker moves one object and reports what happened as a
//! [`TransferOutcome`]. Expected failures (the source cannot produce the
//! object, the destination does not confirm the write) are recorded in the
//! run's progress and returned as values; they never abort the batch.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use media_catalog::CatalogItem;
use media_migration_types::{ItemId, TransferError, TransferErrorKind, TransferResult};
use media_storage::StorageAdapter;

use super::naming::resolve_destination;
use super::progress::MigrationProgress;
use crate::metrics;

/// What a single transfer produced.
#[derive(Debug)]
pub enum TransferOutcome {
    /// Object written to the destination. `item` carries the new location
    /// and must be committed; `original_locator` is the source object.
    Migrated {
        item: CatalogItem,
        original_locator: String,
    },
    /// Dry run: recorded what would have happened, touched nothing.
    Simulated,
    /// Recorded as a [`TransferError`].
    Failed,
}

/// Moves objects from the source backend to the destination backend.
pub struct TransferWorker {
    source: Arc<dyn StorageAdapter>,
    destination: Arc<dyn StorageAdapter>,
    progress: Arc<MigrationProgress>,
    dry_run: bool,
    rename_files: bool,
}

impl TransferWorker {
    pub fn new(
        source: Arc<dyn StorageAdapter>,
        destination: Arc<dyn StorageAdapter>,
        progress: Arc<MigrationProgress>,
        dry_run: bool,
        rename_files: bool,
    ) -> Self {
        Self {
            source,
            destination,
            progress,
            dry_run,
            rename_files,
        }
    }

    /// Transfer one item.
    pub async fn transfer(&self, item: CatalogItem) -> TransferOutcome {
        // Captured before anything can change the record
        let original_locator = item.locator.clone();
        let destination = resolve_destination(&item, self.rename_files);
        let new_path = destination.display_path();

        self.progress.set_current_file(&item.file_name);

        if self.dry_run {
            debug!(
                item_id = item.id,
                old_path = %original_locator,
                new_path = %new_path,
                "Dry run: would migrate"
            );
            self.progress.record_success(
                TransferResult {
                    item_id: item.id,
                    old_path: original_locator,
                    new_path,
                    size: item.size,
                },
                0,
            );
            return TransferOutcome::Simulated;
        }

        let data = match self.source.download(&original_locator).await {
            Ok(data) => data,
            Err(e) => {
                return self.fail(
                    &item,
                    TransferErrorKind::DownloadFailed,
                    format!("download failed: {}", e),
                );
            }
        };
        let bytes = data.len() as u64;

        let new_locator = match self
            .destination
            .upload(&destination.segments, &destination.file_name, data)
            .await
        {
            Ok(locator) => locator,
            Err(e) => {
                return self.fail(
                    &item,
                    TransferErrorKind::UploadFailed,
                    format!("upload failed: {}", e),
                );
            }
        };

        if new_locator.trim().is_empty() {
            return self.fail(
                &item,
                TransferErrorKind::Unexpected,
                "destination confirmed the upload but returned an empty locator".to_string(),
            );
        }

        debug!(
            item_id = item.id,
            old_path = %original_locator,
            new_path = %new_locator,
            bytes,
            "Object migrated"
        );

        self.progress.record_success(
            TransferResult {
                item_id: item.id,
                old_path: original_locator.clone(),
                new_path: new_locator.clone(),
                size: bytes,
            },
            bytes,
        );
        metrics::record_file_migrated(bytes);

        let mut item = item;
        item.relocate(self.destination.storage_type(), new_locator, Utc::now());
        TransferOutcome::Migrated {
            item,
            original_locator,
        }
    }

    fn fail(&self, item: &CatalogItem, kind: TransferErrorKind, message: String) -> TransferOutcome {
        self.record_failure(item.id, &item.file_name, &item.locator, kind, message);
        TransferOutcome::Failed
    }

    /// Record a failure for an item whose worker could not report one
    /// itself (e.g. the task panicked).
    pub fn record_unexpected(&self, item_id: ItemId, file_name: &str, old_path: &str, message: String) {
        self.record_failure(
            item_id,
            file_name,
            old_path,
            TransferErrorKind::Unexpected,
            message,
        );
    }

    fn record_failure(
        &self,
        item_id: ItemId,
        file_name: &str,
        old_path: &str,
        kind: TransferErrorKind,
        message: String,
    ) {
        warn!(
            item_id,
            file_name = %file_name,
            old_path = %old_path,
            kind = %kind,
            error = %message,
            "Transfer failed"
        );
        self.progress.record_failure(TransferError {
            item_id,
            file_name: file_name.to_string(),
            old_path: old_path.to_string(),
            kind,
            message,
        });
        if !self.dry_run {
            metrics::record_file_failed(kind);
        }
    }
}
