// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Media Migrator Library
//!
//! Moves catalogued media objects from one storage backend to another in
//! bounded batches, recording each object's new location in the catalog.
//!
//! # Modules
//!
//! - [`config`] - Migrator configuration (catalog path, backends, defaults)
//! - [`metrics`] - Prometheus counters for migrated and failed objects
//! - [`migration`] - The migration engine and its run registry

pub mod config;
pub mod metrics;
pub mod migration;

pub use config::MigratorConfig;
pub use migration::{EngineSettings, MigrationError, MigrationService};
