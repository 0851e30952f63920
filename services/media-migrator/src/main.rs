// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Media Migrator
//!
//! Command-line front end for the migration engine. It can:
//!
//! - Report how many catalogued objects are still on the source backend
//! - Run one migration to the destination backend, cancellable with Ctrl-C

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::NOTHING};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use media_catalog::{CatalogStore, SqliteCatalog};
use media_migration_types::{
    MediaKind, MigrationFilters, MigrationRequest, MigrationResult, PendingSummary,
};
use media_migrator::{MigrationService, MigratorConfig, metrics};
use media_storage::{BackendConfig, StorageAdapter, StorageBackend};

/// Errors printed after a run, at most
const MAX_ERRORS_SHOWN: usize = 20;

#[derive(Parser)]
#[command(name = "media-migrator")]
#[command(about = "Move catalogued media objects between storage backends", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show objects still waiting on the source backend
    Pending {
        /// Only objects in this scope
        #[arg(long)]
        scope: Option<String>,

        /// Only objects of this kind (image, video, audio, document, other)
        #[arg(long)]
        kind: Option<MediaKind>,
    },

    /// Run a migration
    Run {
        /// Only objects in this scope
        #[arg(long)]
        scope: Option<String>,

        /// Only objects of this kind (image, video, audio, document, other)
        #[arg(long)]
        kind: Option<MediaKind>,

        /// Objects per batch (1-100, default from config)
        #[arg(long)]
        batch_size: Option<u32>,

        /// Concurrent transfers (1-10, default from config)
        #[arg(long)]
        max_concurrency: Option<u32>,

        /// Stop after this many objects (0 = no limit)
        #[arg(long, default_value_t = 0)]
        max_files: u64,

        /// Report what would be migrated without touching anything
        #[arg(long)]
        dry_run: bool,

        /// Store objects under generated names instead of their current paths
        #[arg(long)]
        rename_files: bool,

        /// Delete each source object once its migration is committed
        #[arg(long)]
        delete_source: bool,

        /// Print Prometheus metrics when the run ends
        #[arg(long)]
        print_metrics: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "media_migrator=info,media_storage=info,media_catalog=info".to_string()
            }),
        ))
        .init();

    let config = MigratorConfig::load(cli.config.as_deref()).await?;
    config.validate().context("Invalid configuration")?;

    info!(
        catalog = %config.catalog_db_path.display(),
        source = %describe(config.source.as_ref()),
        destination = %describe(config.destination.as_ref()),
        "Configuration loaded"
    );

    let service = Arc::new(build_service(&config)?);

    match cli.command {
        Commands::Pending { scope, kind } => {
            let summary = service
                .pending_count(&MigrationFilters { scope, kind })
                .await
                .context("Failed to count pending objects")?;
            print_pending(&summary);
            Ok(())
        }

        Commands::Run {
            scope,
            kind,
            batch_size,
            max_concurrency,
            max_files,
            dry_run,
            rename_files,
            delete_source,
            print_metrics,
        } => {
            metrics::register_metrics();

            let request = MigrationRequest {
                filters: MigrationFilters { scope, kind },
                batch_size: batch_size.unwrap_or(config.default_batch_size),
                max_concurrency: max_concurrency.unwrap_or(config.default_max_concurrency),
                max_files,
                dry_run,
                rename_files,
                delete_source_after: delete_source,
            };

            let shutdown = CancellationToken::new();
            spawn_ctrl_c_handler(shutdown.clone());
            let reporter = tokio::spawn(report_progress(
                Arc::clone(&service),
                Duration::from_secs(config.progress_log_interval_secs),
            ));

            let result = service.start(request, &shutdown).await;
            reporter.abort();

            print_result(&result);
            if print_metrics {
                println!();
                print!("{}", metrics::gather_metrics());
            }

            if !result.success {
                bail!("{}", result.message);
            }
            Ok(())
        }
    }
}

fn describe(backend: Option<&BackendConfig>) -> String {
    backend.map_or_else(|| "none".to_string(), BackendConfig::describe)
}

fn build_service(config: &MigratorConfig) -> Result<MigrationService> {
    let (Some(source), Some(destination)) = (&config.source, &config.destination) else {
        bail!("Both source and destination backends must be configured");
    };

    let catalog = SqliteCatalog::open(&config.catalog_db_path).with_context(|| {
        format!(
            "Failed to open catalog: {}",
            config.catalog_db_path.display()
        )
    })?;
    let source = StorageBackend::from_config(source).context("Invalid source backend")?;
    let destination =
        StorageBackend::from_config(destination).context("Invalid destination backend")?;

    let catalog: Arc<dyn CatalogStore> = Arc::new(catalog);
    let source: Arc<dyn StorageAdapter> = Arc::new(source);
    let destination: Arc<dyn StorageAdapter> = Arc::new(destination);

    MigrationService::new(catalog, source, destination, config.engine_settings())
        .context("Failed to create migration service")
}

/// Cancel `token` on the first Ctrl-C. The run stops after its current batch.
fn spawn_ctrl_c_handler(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping after the current batch");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
}

/// Log the active run's progress every `interval` until aborted.
async fn report_progress(service: Arc<MigrationService>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let status = service.status();
        let Some(progress) = status.progress.filter(|p| p.is_running()) else {
            continue;
        };
        info!(
            run_id = %progress.run_id,
            processed = progress.processed_files,
            total = progress.total_files,
            succeeded = progress.success_count,
            failed = progress.failed_count,
            bytes = progress.bytes_transferred,
            percent = progress.progress_percent(),
            current_file = progress.current_file.as_deref().unwrap_or("-"),
            "Migration progress"
        );
    }
}

fn create_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(headers);
    table
}

fn print_pending(summary: &PendingSummary) {
    println!(
        "{} objects pending ({} bytes)",
        summary.count, summary.total_bytes
    );
    if summary.count == 0 {
        return;
    }

    println!();
    let mut table = create_table(&["KIND", "COUNT", "BYTES"]);
    for (kind, bucket) in &summary.by_kind {
        table.add_row(vec![
            kind.to_string(),
            bucket.count.to_string(),
            bucket.total_bytes.to_string(),
        ]);
    }
    println!("{table}");

    println!();
    let mut table = create_table(&["SCOPE", "COUNT", "BYTES"]);
    for (scope, bucket) in &summary.by_scope {
        table.add_row(vec![
            scope.clone(),
            bucket.count.to_string(),
            bucket.total_bytes.to_string(),
        ]);
    }
    println!("{table}");
}

fn print_result(result: &MigrationResult) {
    println!("{}", result.message);

    let Some(progress) = &result.progress else {
        return;
    };

    println!();
    let mut table = create_table(&["RUN", "STATE", "TOTAL", "OK", "FAILED", "BYTES"]);
    table.add_row(vec![
        progress.run_id.to_string(),
        progress.state.to_string(),
        progress.total_files.to_string(),
        progress.success_count.to_string(),
        progress.failed_count.to_string(),
        progress.bytes_transferred.to_string(),
    ]);
    println!("{table}");

    if progress.errors.is_empty() {
        return;
    }

    println!();
    let mut table = create_table(&["ITEM", "FILE", "KIND", "ERROR"]);
    for error in progress.errors.iter().take(MAX_ERRORS_SHOWN) {
        table.add_row(vec![
            error.item_id.to_string(),
            error.file_name.clone(),
            error.kind.to_string(),
            error.message.clone(),
        ]);
    }
    println!("{table}");

    let hidden = progress.failed_count.saturating_sub(MAX_ERRORS_SHOWN as u64);
    if hidden > 0 {
        println!("... and {} more failures", hidden);
    }
}
