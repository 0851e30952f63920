// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Prometheus metrics for the media migrator
//!
//! Exports metrics for monitoring migrations including:
//! - Objects migrated and bytes transferred
//! - Failed objects by failure kind
//! - Source deletions that failed after a successful migration
//! - Finished runs by outcome

use prometheus::{Counter, CounterVec, Opts, Registry, TextEncoder};

use media_migration_types::{MigrationOutcome, TransferErrorKind};

// Static metric initialization uses expect because these are compile-time
// constant definitions that cannot fail in practice. If they do fail, it indicates
// a programming error (e.g., invalid metric name) that should cause a panic at startup.
//
// This module exists to scope the clippy allow attributes to just the metric definitions.
#[allow(clippy::expect_used)]
mod metrics_impl {
    use super::*;
    use lazy_static::lazy_static;

    lazy_static! {
        /// Registry for all migrator metrics
        pub static ref REGISTRY: Registry = Registry::new();

        /// Objects written to the destination and committed
        pub static ref FILES_MIGRATED: Counter = Counter::with_opts(
            Opts::new("media_migrator_files_migrated_total", "Total objects migrated")
        ).expect("valid metric name");

        /// Objects that could not be migrated, by failure kind
        pub static ref FILES_FAILED: CounterVec = CounterVec::new(
            Opts::new("media_migrator_files_failed_total", "Objects that failed to migrate by kind"),
            &["kind"]
        ).expect("valid metric name and labels");

        /// Bytes written to the destination
        pub static ref BYTES_TRANSFERRED: Counter = Counter::with_opts(
            Opts::new("media_migrator_bytes_transferred_total", "Total bytes transferred")
        ).expect("valid metric name");

        /// Source objects left behind because deleting them failed
        ///
        /// The item itself is migrated; only the cleanup of the old copy was
        /// degraded.
        pub static ref SOURCE_DELETE_FAILURES: Counter = Counter::with_opts(
            Opts::new(
                "media_migrator_source_delete_failures_total",
                "Total failures to delete a source object after migrating it"
            )
        ).expect("valid metric name");

        /// Finished runs by outcome
        pub static ref RUNS_TOTAL: CounterVec = CounterVec::new(
            Opts::new("media_migrator_runs_total", "Migration runs by outcome"),
            &["outcome"]
        ).expect("valid metric name and labels");
    }
}

pub use metrics_impl::{
    BYTES_TRANSFERRED, FILES_FAILED, FILES_MIGRATED, REGISTRY, RUNS_TOTAL, SOURCE_DELETE_FAILURES,
};

/// Register all metrics with the registry
///
/// Should be called once during application startup.
/// Panics if registration fails (indicates a programming error).
#[allow(clippy::expect_used)]
pub fn register_metrics() {
    REGISTRY
        .register(Box::new(FILES_MIGRATED.clone()))
        .expect("Failed to register FILES_MIGRATED");
    REGISTRY
        .register(Box::new(FILES_FAILED.clone()))
        .expect("Failed to register FILES_FAILED");
    REGISTRY
        .register(Box::new(BYTES_TRANSFERRED.clone()))
        .expect("Failed to register BYTES_TRANSFERRED");
    REGISTRY
        .register(Box::new(SOURCE_DELETE_FAILURES.clone()))
        .expect("Failed to register SOURCE_DELETE_FAILURES");
    REGISTRY
        .register(Box::new(RUNS_TOTAL.clone()))
        .expect("Failed to register RUNS_TOTAL");
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

/// Record an object written to the destination
pub fn record_file_migrated(bytes: u64) {
    FILES_MIGRATED.inc();
    BYTES_TRANSFERRED.inc_by(bytes as f64);
}

/// Record an object that failed to migrate
pub fn record_file_failed(kind: TransferErrorKind) {
    FILES_FAILED.with_label_values(&[kind.to_string().as_str()]).inc();
}

/// Record a source object that could not be deleted after migrating
pub fn record_source_delete_failure() {
    SOURCE_DELETE_FAILURES.inc();
}

/// Record a finished run
pub fn record_run(outcome: MigrationOutcome) {
    RUNS_TOTAL.with_label_values(&[outcome.to_string().as_str()]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_counters() {
        let migrated_before = FILES_MIGRATED.get();
        let bytes_before = BYTES_TRANSFERRED.get();
        record_file_migrated(100);
        record_file_migrated(50);
        assert_eq!(FILES_MIGRATED.get() - migrated_before, 2.0);
        assert_eq!(BYTES_TRANSFERRED.get() - bytes_before, 150.0);
    }

    #[test]
    fn test_labelled_counters() {
        let failed = FILES_FAILED.with_label_values(&["upload_failed"]);
        let before = failed.get();
        record_file_failed(TransferErrorKind::UploadFailed);
        assert_eq!(failed.get() - before, 1.0);

        let cancelled = RUNS_TOTAL.with_label_values(&["cancelled"]);
        let before = cancelled.get();
        record_run(MigrationOutcome::Cancelled);
        assert_eq!(cancelled.get() - before, 1.0);
    }

    #[test]
    fn test_source_delete_failures() {
        let before = SOURCE_DELETE_FAILURES.get();
        record_source_delete_failure();
        assert_eq!(SOURCE_DELETE_FAILURES.get() - before, 1.0);
    }
}
