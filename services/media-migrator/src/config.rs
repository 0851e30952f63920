// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Configuration for the media migrator

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use media_migration_types::{MAX_BATCH_SIZE, MAX_CONCURRENCY};
use media_storage::BackendConfig;

use crate::migration::EngineSettings;

/// Default location of the catalog database
const DEFAULT_CATALOG_DB_PATH: &str = "/var/tmp/media-migrator/catalog.db";

/// Migrator configuration loaded from a JSON file and environment variables
///
/// Every field has a default, so a file only needs to name what it changes.
/// The backends have no sensible default and must come from the file.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MigratorConfig {
    /// SQLite catalog of media objects
    pub catalog_db_path: PathBuf,

    /// Backend objects are migrated from
    pub source: Option<BackendConfig>,

    /// Backend objects are migrated to
    pub destination: Option<BackendConfig>,

    /// Batch size used when the command line does not give one
    pub default_batch_size: u32,

    /// Concurrency used when the command line does not give one
    pub default_max_concurrency: u32,

    /// Cap on each of the result and error logs kept per run
    pub max_logged_entries: usize,

    /// Finished runs kept for status queries
    pub history_limit: usize,

    /// How often a running migration logs its progress
    pub progress_log_interval_secs: u64,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            catalog_db_path: PathBuf::from(DEFAULT_CATALOG_DB_PATH),
            source: None,
            destination: None,
            default_batch_size: 50,
            default_max_concurrency: 4,
            max_logged_entries: 1000,
            history_limit: 10,
            progress_log_interval_secs: 5,
        }
    }
}

impl MigratorConfig {
    /// Load configuration from a JSON file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load the file at `path` if one is given, otherwise the defaults, then
    /// apply environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path).await?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Override fields from `CATALOG_DB_PATH`, `MIGRATOR_BATCH_SIZE` and
    /// `MIGRATOR_MAX_CONCURRENCY` when they are set.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup("CATALOG_DB_PATH") {
            self.catalog_db_path = PathBuf::from(path);
        }

        if let Some(value) = lookup("MIGRATOR_BATCH_SIZE") {
            self.default_batch_size = value
                .parse()
                .context("Invalid MIGRATOR_BATCH_SIZE")?;
        }

        if let Some(value) = lookup("MIGRATOR_MAX_CONCURRENCY") {
            self.default_max_concurrency = value
                .parse()
                .context("Invalid MIGRATOR_MAX_CONCURRENCY")?;
        }

        Ok(())
    }

    /// Check the configuration can drive a migration.
    pub fn validate(&self) -> Result<()> {
        if self.catalog_db_path.as_os_str().is_empty() {
            bail!("catalog_db_path must not be empty");
        }

        let Some(source) = &self.source else {
            bail!("no source backend configured");
        };
        let Some(destination) = &self.destination else {
            bail!("no destination backend configured");
        };
        if source.storage_type() == destination.storage_type() {
            bail!(
                "source ({}) and destination ({}) must be different backend types",
                source.describe(),
                destination.describe()
            );
        }

        if !(1..=MAX_BATCH_SIZE).contains(&self.default_batch_size) {
            bail!(
                "default_batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE,
                self.default_batch_size
            );
        }
        if !(1..=MAX_CONCURRENCY).contains(&self.default_max_concurrency) {
            bail!(
                "default_max_concurrency must be between 1 and {}, got {}",
                MAX_CONCURRENCY,
                self.default_max_concurrency
            );
        }
        if self.max_logged_entries == 0 {
            bail!("max_logged_entries must be at least 1");
        }
        if self.history_limit == 0 {
            bail!("history_limit must be at least 1");
        }
        if self.progress_log_interval_secs == 0 {
            bail!("progress_log_interval_secs must be at least 1");
        }

        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_logged_entries: self.max_logged_entries,
            history_limit: self.history_limit,
        }
    }
}
