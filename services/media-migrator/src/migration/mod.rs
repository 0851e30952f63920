// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Media migration engine
//!
//! The [`MigrationService`] moves catalogued objects from a source backend to
//! a destination backend. A run walks eligible items in batches, fans each
//! batch out to transfer workers under a concurrency limit, waits for the
//! whole batch, then commits the batch's new locations in one catalog
//! transaction before fetching the next one.
//!
//! # Modules
//!
//! - [`cursor`] - Stable-key batch iteration
//! - [`naming`] - Destination path resolution
//! - [`progress`] - Live progress counters and capped logs
//! - [`registry`] - Sessions and the single active run
//! - [`worker`] - Per-item transfer

pub mod cursor;
pub mod naming;
pub mod progress;
pub mod registry;
pub mod worker;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, warn};

use media_catalog::{CatalogError, CatalogItem, CatalogStore, EligibilityFilter};
use media_migration_types::{
    ItemId, MigrationFilters, MigrationOutcome, MigrationRequest, MigrationResult,
    MigrationStatus, PendingSummary, RunId, RunState, RunSummary, StorageType,
};
use media_storage::StorageAdapter;

use crate::metrics;
use cursor::BatchCursor;
use registry::{ActiveRun, MigrationSession, RunRegistry};
use worker::{TransferOutcome, TransferWorker};

pub use naming::{DestinationPath, resolve_destination};
pub use progress::MigrationProgress;

/// Errors that end a run (as opposed to per-item failures, which are
/// recorded and skipped)
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("catalog commit for batch {batch} failed, {items} transfers were not recorded: {source}")]
    Commit {
        batch: u64,
        items: usize,
        #[source]
        source: CatalogError,
    },

    #[error("Source and destination are both {0} backends")]
    SameBackend(StorageType),
}

/// Engine tunables that are not part of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Cap on each of the result and error logs of a run
    pub max_logged_entries: usize,
    /// Finished runs kept for status queries
    pub history_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_logged_entries: 1000,
            history_limit: 10,
        }
    }
}

/// How the batch loop ended, when it did not fail
enum LoopEnd {
    Completed,
    Cancelled,
    NothingToDo,
}

/// Coordinates migration runs between one source and one destination.
pub struct MigrationService {
    catalog: Arc<dyn CatalogStore>,
    source: Arc<dyn StorageAdapter>,
    destination: Arc<dyn StorageAdapter>,
    settings: EngineSettings,
    registry: RunRegistry,
}

impl MigrationService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        source: Arc<dyn StorageAdapter>,
        destination: Arc<dyn StorageAdapter>,
        settings: EngineSettings,
    ) -> Result<Self, MigrationError> {
        let source_type = source.storage_type();
        if source_type == destination.storage_type() {
            return Err(MigrationError::SameBackend(source_type));
        }

        Ok(Self {
            catalog,
            source,
            destination,
            settings,
            registry: RunRegistry::new(settings.history_limit),
        })
    }

    fn eligibility(&self, filters: &MigrationFilters) -> EligibilityFilter {
        EligibilityFilter::new(self.source.storage_type(), filters)
    }

    /// Count and size of items still on the source backend.
    pub async fn pending_count(
        &self,
        filters: &MigrationFilters,
    ) -> Result<PendingSummary, MigrationError> {
        Ok(self
            .catalog
            .count_eligible(&self.eligibility(filters))
            .await?)
    }

    /// Status of the active run, or else of the most recent one.
    pub fn status(&self) -> MigrationStatus {
        match self.registry.active().or_else(|| self.registry.latest()) {
            Some(session) => session.status(),
            None => MigrationStatus {
                is_running: false,
                message: "No migration has been run".to_string(),
                progress: None,
            },
        }
    }

    /// Status of a specific retained run.
    pub fn run(&self, id: RunId) -> Option<MigrationStatus> {
        self.registry.get(id).map(|session| session.status())
    }

    /// Retained runs, newest first.
    pub fn runs(&self) -> Vec<RunSummary> {
        self.registry
            .recent()
            .iter()
            .map(|session| session.summary())
            .collect()
    }

    /// Ask the active run to stop after its current batch.
    ///
    /// Returns `false` if no run is active.
    pub fn cancel(&self) -> bool {
        let cancelled = self.registry.cancel_active();
        if cancelled {
            info!("Cancellation requested for active migration");
        }
        cancelled
    }

    /// Run a migration to completion, cancellation, or failure.
    ///
    /// Cancelling `caller` has the same effect as [`Self::cancel`]. If another
    /// run is active, nothing is started and the result is
    /// [`MigrationOutcome::Declined`].
    pub async fn start(
        &self,
        request: MigrationRequest,
        caller: &CancellationToken,
    ) -> MigrationResult {
        let request = request.clamped();
        let max_logged_entries = self.settings.max_logged_entries;
        let Some(session) = self.registry.try_begin(|| {
            MigrationSession::new(request, caller.child_token(), max_logged_entries)
        }) else {
            info!("Migration declined, another run is active");
            return MigrationResult {
                success: false,
                outcome: MigrationOutcome::Declined,
                message: "A migration is already running.".to_string(),
                progress: None,
            };
        };
        let _active = ActiveRun::new(&self.registry, Arc::clone(&session));

        let request = session.request();
        info!(
            run_id = %session.id(),
            source = %self.source.storage_type(),
            destination = %self.destination.storage_type(),
            scope = ?request.filters.scope,
            kind = ?request.filters.kind,
            batch_size = request.batch_size,
            max_concurrency = request.max_concurrency,
            max_files = request.max_files,
            dry_run = request.dry_run,
            rename_files = request.rename_files,
            delete_source_after = request.delete_source_after,
            "Starting migration"
        );

        let progress = Arc::clone(session.progress());
        let (state, outcome, message) = match self.execute(&session).await {
            Ok(LoopEnd::NothingToDo) => (
                RunState::Completed,
                MigrationOutcome::Completed,
                "No files to migrate.".to_string(),
            ),
            Ok(LoopEnd::Completed) => {
                let message = if request.dry_run {
                    format!(
                        "Dry run: {} files would be migrated, {} failed.",
                        progress.success_count(),
                        progress.failed_count()
                    )
                } else {
                    format!(
                        "{} files migrated, {} failed.",
                        progress.success_count(),
                        progress.failed_count()
                    )
                };
                (RunState::Completed, MigrationOutcome::Completed, message)
            }
            Ok(LoopEnd::Cancelled) => (
                RunState::Cancelled,
                MigrationOutcome::Cancelled,
                format!(
                    "Migration cancelled: {} files migrated, {} failed before stopping.",
                    progress.success_count(),
                    progress.failed_count()
                ),
            ),
            Err(e) => {
                error!(run_id = %session.id(), error = %e, "Migration failed");
                (
                    RunState::Failed,
                    MigrationOutcome::Failed,
                    format!("Migration failed: {}", e),
                )
            }
        };

        session.conclude(outcome, message.clone());
        progress.finish(state);
        metrics::record_run(outcome);

        let snapshot = progress.snapshot();
        info!(
            run_id = %session.id(),
            outcome = %outcome,
            processed = snapshot.processed_files,
            succeeded = snapshot.success_count,
            failed = snapshot.failed_count,
            bytes = snapshot.bytes_transferred,
            "Migration finished"
        );

        MigrationResult {
            success: outcome == MigrationOutcome::Completed && snapshot.failed_count == 0,
            outcome,
            message,
            progress: Some(snapshot),
        }
    }

    async fn execute(&self, session: &MigrationSession) -> Result<LoopEnd, MigrationError> {
        let request = session.request();
        let progress = session.progress();
        let filter = self.eligibility(&request.filters);

        let eligible = self.catalog.count_eligible(&filter).await?.count;
        let total = request
            .file_cap()
            .map_or(eligible, |cap| eligible.min(cap));
        progress.set_total(total);

        info!(run_id = %session.id(), eligible, total, "Counted eligible files");
        if total == 0 {
            return Ok(LoopEnd::NothingToDo);
        }

        let semaphore = Arc::new(Semaphore::new(request.max_concurrency as usize));
        let worker = Arc::new(TransferWorker::new(
            Arc::clone(&self.source),
            Arc::clone(&self.destination),
            Arc::clone(progress),
            request.dry_run,
            request.rename_files,
        ));
        let mut cursor = BatchCursor::new(
            Arc::clone(&self.catalog),
            filter,
            request.batch_size,
            total,
        );
        let mut batch_number = 0u64;

        loop {
            if session.is_cancelled() {
                info!(
                    run_id = %session.id(),
                    batches = batch_number,
                    processed = progress.processed_files(),
                    "Migration cancelled between batches"
                );
                return Ok(LoopEnd::Cancelled);
            }

            let after_id = cursor.position();
            let Some(batch) = cursor.next_batch().await? else {
                break;
            };
            batch_number += 1;

            info!(
                run_id = %session.id(),
                batch = batch_number,
                batch_size = batch.len(),
                after_id,
                "Processing batch"
            );

            self.process_batch(session, batch_number, batch, &worker, &semaphore)
                .await?;
        }

        Ok(LoopEnd::Completed)
    }

    /// Transfer every item of a batch, then commit the batch.
    async fn process_batch(
        &self,
        session: &MigrationSession,
        batch_number: u64,
        batch: Vec<CatalogItem>,
        worker: &Arc<TransferWorker>,
        semaphore: &Arc<Semaphore>,
    ) -> Result<(), MigrationError> {
        let request = session.request();

        // The original path of every item stays with its handle so a worker
        // that dies can still be reported. Dropping the handles aborts the
        // workers, so an abandoned run stops touching either backend.
        let mut handles = Vec::with_capacity(batch.len());
        for item in batch {
            let captured = (item.id, item.file_name.clone(), item.locator.clone());
            let worker = Arc::clone(worker);
            let semaphore = Arc::clone(semaphore);

            let handle = AbortOnDropHandle::new(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    worker.record_unexpected(
                        item.id,
                        &item.file_name,
                        &item.locator,
                        "concurrency limiter closed".to_string(),
                    );
                    return TransferOutcome::Failed;
                };
                worker.transfer(item).await
            }));
            handles.push((captured, handle));
        }

        let mut migrated = Vec::new();
        let mut originals = Vec::new();
        for ((item_id, file_name, old_path), handle) in handles {
            match handle.await {
                Ok(TransferOutcome::Migrated {
                    item,
                    original_locator,
                }) => {
                    migrated.push(item);
                    originals.push((item_id, original_locator));
                }
                Ok(TransferOutcome::Simulated | TransferOutcome::Failed) => {}
                Err(e) => {
                    error!(
                        run_id = %session.id(),
                        item_id,
                        error = %e,
                        "Transfer task panicked"
                    );
                    worker.record_unexpected(
                        item_id,
                        &file_name,
                        &old_path,
                        format!("transfer task failed: {}", e),
                    );
                }
            }
        }

        if !migrated.is_empty() {
            self.catalog
                .commit_batch(&migrated)
                .await
                .map_err(|source| MigrationError::Commit {
                    batch: batch_number,
                    items: migrated.len(),
                    source,
                })?;
            debug!(
                run_id = %session.id(),
                batch = batch_number,
                committed = migrated.len(),
                "Committed batch"
            );
        }

        if request.delete_source_after && !request.dry_run && !originals.is_empty() {
            self.delete_originals(session.id(), originals, semaphore)
                .await;
        }

        Ok(())
    }

    /// Remove source objects whose migration has been committed. Failures are
    /// logged and counted only; the items are already migrated.
    async fn delete_originals(
        &self,
        run_id: RunId,
        originals: Vec<(ItemId, String)>,
        semaphore: &Arc<Semaphore>,
    ) {
        let mut tasks: JoinSet<()> = JoinSet::new();

        for (item_id, locator) in originals {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(semaphore);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                match source.delete(&locator).await {
                    Ok(()) => {
                        debug!(run_id = %run_id, item_id, locator = %locator, "Deleted source object");
                    }
                    Err(e) => {
                        warn!(
                            run_id = %run_id,
                            item_id,
                            locator = %locator,
                            error = %e,
                            "Failed to delete source object after migration"
                        );
                        metrics::record_source_delete_failure();
                    }
                }
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(run_id = %run_id, error = %e, "Source delete task panicked");
                metrics::record_source_delete_failure();
            }
        }
    }
}
