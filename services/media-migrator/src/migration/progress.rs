// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Live progress of a migration run
//!
//! Counters are atomics so concurrent workers never contend on them; the
//! capped result/error logs and the lifecycle fields sit behind a short-lived
//! mutex. Updates take that mutex too, so once [`MigrationProgress::finish`]
//! has run nothing changes. Callers outside the engine only ever see a
//! [`MigrationProgressSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use media_migration_types::{
    MigrationProgressSnapshot, RunId, RunState, TransferError, TransferResult,
};

#[derive(Debug, Default)]
struct ProgressLog {
    state: RunState,
    completed_at: Option<DateTime<Utc>>,
    current_file: Option<String>,
    results: Vec<TransferResult>,
    errors: Vec<TransferError>,
    overflow_count: u64,
}

/// Shared, concurrently updated progress of one run
#[derive(Debug)]
pub struct MigrationProgress {
    run_id: RunId,
    dry_run: bool,
    started_at: DateTime<Utc>,
    max_logged_entries: usize,

    total_files: AtomicU64,
    processed_files: AtomicU64,
    success_count: AtomicU64,
    failed_count: AtomicU64,
    bytes_transferred: AtomicU64,

    log: Mutex<ProgressLog>,
}

impl MigrationProgress {
    pub fn new(run_id: RunId, dry_run: bool, max_logged_entries: usize) -> Self {
        Self {
            run_id,
            dry_run,
            started_at: Utc::now(),
            max_logged_entries,
            total_files: AtomicU64::new(0),
            processed_files: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failed_count: AtomicU64::new(0),
            bytes_transferred: AtomicU64::new(0),
            log: Mutex::new(ProgressLog::default()),
        }
    }

    fn log(&self) -> MutexGuard<'_, ProgressLog> {
        self.log.lock().unwrap_or_else(|poisoned| {
            tracing::error!(run_id = %self.run_id, "Progress log mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn set_total(&self, total: u64) {
        self.total_files.store(total, Ordering::SeqCst);
    }

    pub fn total_files(&self) -> u64 {
        self.total_files.load(Ordering::SeqCst)
    }

    pub fn processed_files(&self) -> u64 {
        self.processed_files.load(Ordering::SeqCst)
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed_count.load(Ordering::SeqCst)
    }

    pub fn set_current_file(&self, file_name: &str) {
        let mut log = self.log();
        if log.completed_at.is_none() {
            log.current_file = Some(file_name.to_string());
        }
    }

    /// Record a transferred (or, in a dry run, simulated) item.
    pub fn record_success(&self, result: TransferResult, bytes: u64) {
        let mut log = self.log();
        if log.completed_at.is_some() {
            tracing::debug!(run_id = %self.run_id, item_id = result.item_id, "Run already finished, result dropped");
            return;
        }
        self.success_count.fetch_add(1, Ordering::SeqCst);
        self.bytes_transferred.fetch_add(bytes, Ordering::SeqCst);
        self.processed_files.fetch_add(1, Ordering::SeqCst);

        if log.results.len() < self.max_logged_entries {
            log.results.push(result);
        } else {
            log.overflow_count += 1;
        }
    }

    /// Record an item that could not be moved.
    pub fn record_failure(&self, error: TransferError) {
        let mut log = self.log();
        if log.completed_at.is_some() {
            tracing::debug!(run_id = %self.run_id, item_id = error.item_id, "Run already finished, failure dropped");
            return;
        }
        self.failed_count.fetch_add(1, Ordering::SeqCst);
        self.processed_files.fetch_add(1, Ordering::SeqCst);

        if log.errors.len() < self.max_logged_entries {
            log.errors.push(error);
        } else {
            log.overflow_count += 1;
        }
    }

    /// Freeze the run in a terminal state. Only the first call has an effect.
    pub fn finish(&self, state: RunState) -> bool {
        let mut log = self.log();
        if log.completed_at.is_some() {
            return false;
        }
        log.state = state;
        log.completed_at = Some(Utc::now());
        log.current_file = None;
        true
    }

    pub fn is_running(&self) -> bool {
        self.log().completed_at.is_none()
    }

    pub fn snapshot(&self) -> MigrationProgressSnapshot {
        let log = self.log();
        MigrationProgressSnapshot {
            run_id: self.run_id,
            dry_run: self.dry_run,
            state: log.state,
            started_at: self.started_at,
            completed_at: log.completed_at,
            total_files: self.total_files(),
            processed_files: self.processed_files(),
            success_count: self.success_count(),
            failed_count: self.failed_count(),
            bytes_transferred: self.bytes_transferred.load(Ordering::SeqCst),
            current_file: log.current_file.clone(),
            results: log.results.clone(),
            errors: log.errors.clone(),
            overflow_count: log.overflow_count,
        }
    }
}
