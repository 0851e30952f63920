// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Migration sessions and the registry that owns them
//!
//! A [`MigrationSession`] is everything one run needs to be observed and
//! stopped. The [`RunRegistry`] holds the sessions and enforces that at most
//! one of them is active: claiming the active slot and inserting the session
//! happen under a single lock.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use media_migration_types::{
    MigrationOutcome, MigrationRequest, MigrationStatus, RunId, RunState, RunSummary,
};

use super::progress::MigrationProgress;

/// One migration run.
#[derive(Debug)]
pub struct MigrationSession {
    id: RunId,
    request: MigrationRequest,
    progress: Arc<MigrationProgress>,
    cancel: CancellationToken,
    conclusion: Mutex<Option<(MigrationOutcome, String)>>,
}

impl MigrationSession {
    /// `request` must already be clamped.
    pub fn new(request: MigrationRequest, cancel: CancellationToken, max_logged_entries: usize) -> Self {
        let id = uuid::Uuid::new_v4();
        Self {
            id,
            progress: Arc::new(MigrationProgress::new(id, request.dry_run, max_logged_entries)),
            request,
            cancel,
            conclusion: Mutex::new(None),
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn request(&self) -> &MigrationRequest {
        &self.request
    }

    pub fn progress(&self) -> &Arc<MigrationProgress> {
        &self.progress
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn conclusion(&self) -> MutexGuard<'_, Option<(MigrationOutcome, String)>> {
        self.conclusion.lock().unwrap_or_else(|poisoned| {
            tracing::error!(run_id = %self.id, "Session mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn conclude(&self, outcome: MigrationOutcome, message: String) {
        *self.conclusion() = Some((outcome, message));
    }

    pub fn outcome(&self) -> Option<MigrationOutcome> {
        self.conclusion().as_ref().map(|(outcome, _)| *outcome)
    }

    pub fn status(&self) -> MigrationStatus {
        let progress = self.progress.snapshot();
        let message = match self.conclusion().as_ref() {
            Some((_, message)) if !progress.is_running() => message.clone(),
            _ => {
                let verb = if progress.dry_run {
                    "Dry run in progress"
                } else {
                    "Migration in progress"
                };
                format!(
                    "{}: {}/{} files processed.",
                    verb, progress.processed_files, progress.total_files
                )
            }
        };

        MigrationStatus {
            is_running: progress.is_running(),
            message,
            progress: Some(progress),
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from(&self.progress.snapshot())
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    active: Option<RunId>,
    runs: HashMap<RunId, Arc<MigrationSession>>,
    /// Oldest first
    order: VecDeque<RunId>,
}

/// Owns every retained session and the single active slot.
#[derive(Debug)]
pub struct RunRegistry {
    history_limit: usize,
    inner: Mutex<RegistryInner>,
}

impl RunRegistry {
    pub fn new(history_limit: usize) -> Self {
        Self {
            history_limit: history_limit.max(1),
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Run registry mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Register the session built by `make` as the active run, unless a run
    /// is already active.
    pub fn try_begin(
        &self,
        make: impl FnOnce() -> MigrationSession,
    ) -> Option<Arc<MigrationSession>> {
        let mut inner = self.inner();
        if inner.active.is_some() {
            return None;
        }

        let session = Arc::new(make());
        let id = session.id();
        inner.active = Some(id);
        inner.runs.insert(id, Arc::clone(&session));
        inner.order.push_back(id);
        self.prune(&mut inner);
        Some(session)
    }

    /// Release the active slot held by `id`.
    pub fn release(&self, id: RunId) {
        let mut inner = self.inner();
        if inner.active == Some(id) {
            inner.active = None;
        }
        self.prune(&mut inner);
    }

    fn prune(&self, inner: &mut RegistryInner) {
        while inner.order.len() > self.history_limit {
            let Some(oldest) = inner.order.front().copied() else {
                break;
            };
            if inner.active == Some(oldest) {
                break;
            }
            inner.order.pop_front();
            inner.runs.remove(&oldest);
        }
    }

    pub fn active(&self) -> Option<Arc<MigrationSession>> {
        let inner = self.inner();
        inner.active.and_then(|id| inner.runs.get(&id).cloned())
    }

    /// Most recently started run
    pub fn latest(&self) -> Option<Arc<MigrationSession>> {
        let inner = self.inner();
        inner.order.back().and_then(|id| inner.runs.get(id).cloned())
    }

    pub fn get(&self, id: RunId) -> Option<Arc<MigrationSession>> {
        self.inner().runs.get(&id).cloned()
    }

    /// Retained runs, newest first
    pub fn recent(&self) -> Vec<Arc<MigrationSession>> {
        let inner = self.inner();
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.runs.get(id).cloned())
            .collect()
    }

    /// Signal the active run to stop. Returns `false` if nothing is running.
    pub fn cancel_active(&self) -> bool {
        match self.active() {
            Some(session) => {
                session.cancel();
                true
            }
            None => false,
        }
    }
}

/// Holds the registry's active slot for one run and gives it back on drop,
/// including when the run's future is dropped before completing.
pub(crate) struct ActiveRun<'a> {
    registry: &'a RunRegistry,
    session: Arc<MigrationSession>,
}

impl<'a> ActiveRun<'a> {
    pub(crate) fn new(registry: &'a RunRegistry, session: Arc<MigrationSession>) -> Self {
        Self { registry, session }
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        let progress = self.session.progress();
        if progress.is_running() {
            tracing::warn!(run_id = %self.session.id(), "Migration abandoned before completion");
            self.session.conclude(
                MigrationOutcome::Cancelled,
                format!(
                    "Migration abandoned: {} files migrated, {} failed before stopping.",
                    progress.success_count(),
                    progress.failed_count()
                ),
            );
            progress.finish(RunState::Cancelled);
        }
        self.registry.release(self.session.id());
    }
}
