// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Shared types for the media storage migration engine.
//!
//! This crate contains the data structures exchanged between the migration
//! engine, the storage backends, the catalog store and whatever surface
//! drives a migration (the operator CLI today).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

// ============================================================================
// Type Aliases
// ============================================================================

/// Catalog item identifier (monotonic, orderable)
pub type ItemId = i64;

/// Migration run identifier
pub type RunId = uuid::Uuid;

// ============================================================================
// Limits
// ============================================================================

/// Smallest batch the cursor will fetch
pub const MIN_BATCH_SIZE: u32 = 1;

/// Largest batch the cursor will fetch
pub const MAX_BATCH_SIZE: u32 = 100;

/// Smallest number of concurrent transfers
pub const MIN_CONCURRENCY: u32 = 1;

/// Largest number of concurrent transfers
pub const MAX_CONCURRENCY: u32 = 10;

// ============================================================================
// Catalog Types
// ============================================================================

/// Kind of storage backend an object lives on.
///
/// Persisted in the catalog as its snake_case name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StorageType {
    /// Local disk under a root directory
    Local,
    /// HTTP object server (GET/PUT/DELETE by path)
    Http,
}

/// Kind of media object.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    #[default]
    Other,
}

impl MediaKind {
    /// Extension used when an object's own name carries none.
    pub fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
            MediaKind::Document => "pdf",
            MediaKind::Other => "bin",
        }
    }

    /// Parse a stored kind, mapping anything unrecognised to `Other`.
    pub fn from_stored(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Count and size of a group of pending objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PendingBucket {
    pub count: u64,
    pub total_bytes: u64,
}

impl PendingBucket {
    pub fn add(&mut self, count: u64, bytes: u64) {
        self.count += count;
        self.total_bytes += bytes;
    }
}

/// Aggregate over items still stored on the source backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PendingSummary {
    /// Number of eligible items
    pub count: u64,
    /// Sum of eligible item sizes in bytes
    pub total_bytes: u64,
    /// Breakdown by media kind
    pub by_kind: BTreeMap<MediaKind, PendingBucket>,
    /// Breakdown by ownership scope
    pub by_scope: BTreeMap<String, PendingBucket>,
}

// ============================================================================
// Request Types
// ============================================================================

/// Filters selecting which catalog items a migration considers.
///
/// The source backend's storage type is always applied on top of these, so
/// only items still on the source are ever eligible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MigrationFilters {
    /// Restrict to a single ownership scope
    #[serde(default)]
    pub scope: Option<String>,
    /// Restrict to a single media kind
    #[serde(default)]
    pub kind: Option<MediaKind>,
}

/// Parameters for starting a migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MigrationRequest {
    pub filters: MigrationFilters,
    /// Items fetched per batch, clamped to [1, 100]
    pub batch_size: u32,
    /// Concurrent transfers, clamped to [1, 10]
    pub max_concurrency: u32,
    /// Maximum items to process (0 = unlimited)
    pub max_files: u64,
    /// Simulate the run without I/O or catalog changes
    pub dry_run: bool,
    /// Rebuild destination names from naming context
    pub rename_files: bool,
    /// Delete the source object once the destination is authoritative
    pub delete_source_after: bool,
}

impl Default for MigrationRequest {
    fn default() -> Self {
        Self {
            filters: MigrationFilters::default(),
            batch_size: 50,
            max_concurrency: 4,
            max_files: 0,
            dry_run: false,
            rename_files: false,
            delete_source_after: false,
        }
    }
}

impl MigrationRequest {
    /// Return a copy with batch size and concurrency forced into range.
    pub fn clamped(&self) -> Self {
        Self {
            batch_size: self.batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE),
            max_concurrency: self.max_concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
            ..self.clone()
        }
    }

    /// The file cap, if one was requested.
    pub fn file_cap(&self) -> Option<u64> {
        (self.max_files > 0).then_some(self.max_files)
    }
}

// ============================================================================
// Progress Types
// ============================================================================

/// A single object that was (or in a dry run, would be) moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TransferResult {
    pub item_id: ItemId,
    pub old_path: String,
    pub new_path: String,
    pub size: u64,
}

/// Why a single object could not be moved.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransferErrorKind {
    /// Source adapter could not produce the object
    DownloadFailed,
    /// Destination adapter did not confirm the write
    UploadFailed,
    /// Anything else, including a worker that panicked
    Unexpected,
}

/// A recorded per-item failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TransferError {
    pub item_id: ItemId,
    pub file_name: String,
    pub old_path: String,
    pub kind: TransferErrorKind,
    pub message: String,
}

/// Lifecycle state of a migration run.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunState {
    #[default]
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Point-in-time copy of a run's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MigrationProgressSnapshot {
    pub run_id: RunId,
    pub dry_run: bool,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_files: u64,
    pub processed_files: u64,
    pub success_count: u64,
    pub failed_count: u64,
    pub bytes_transferred: u64,
    pub current_file: Option<String>,
    pub results: Vec<TransferResult>,
    pub errors: Vec<TransferError>,
    /// Log entries dropped after the result/error cap was reached
    pub overflow_count: u64,
}

impl MigrationProgressSnapshot {
    pub fn is_running(&self) -> bool {
        self.completed_at.is_none()
    }

    /// Percentage of the eligible total processed so far, in [0, 100].
    pub fn progress_percent(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        let pct = self.processed_files as f64 / self.total_files as f64 * 100.0;
        pct.min(100.0)
    }
}

// ============================================================================
// Status / Result Surfaces
// ============================================================================

/// Answer to a status poll. Safe to request at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MigrationStatus {
    pub is_running: bool,
    pub message: String,
    pub progress: Option<MigrationProgressSnapshot>,
}

/// How a call to start a migration ended.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MigrationOutcome {
    Completed,
    Cancelled,
    Failed,
    /// Another run was already active; nothing was started
    Declined,
}

/// Final answer of a migration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MigrationResult {
    pub success: bool,
    pub outcome: MigrationOutcome,
    pub message: String,
    /// Absent only when the start was declined
    pub progress: Option<MigrationProgressSnapshot>,
}

/// One line of run history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunSummary {
    pub run_id: RunId,
    pub state: RunState,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processed_files: u64,
    pub success_count: u64,
    pub failed_count: u64,
}

impl From<&MigrationProgressSnapshot> for RunSummary {
    fn from(p: &MigrationProgressSnapshot) -> Self {
        Self {
            run_id: p.run_id,
            state: p.state,
            dry_run: p.dry_run,
            started_at: p.started_at,
            completed_at: p.completed_at,
            processed_files: p.processed_files,
            success_count: p.success_count,
            failed_count: p.failed_count,
        }
    }
}
