// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Catalog of media objects
//!
//! The catalog records, for every media object, which backend holds it and
//! under which locator. A migration reads eligible items in id order and
//! writes back the new `locator`/`storage_type` pair for each item whose
//! transfer was confirmed.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use media_migration_types::{ItemId, MediaKind, MigrationFilters, PendingSummary, StorageType};

pub use sqlite::SqliteCatalog;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Catalog item not found: {0}")]
    NotFound(ItemId),
    #[error("Invalid catalog value: {0}")]
    Invalid(String),
}

/// One media object as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    /// Ownership scope (tenant, account, ...)
    pub scope: String,
    pub kind: MediaKind,
    pub storage_type: StorageType,
    pub locator: String,
    pub file_name: String,
    pub size: u64,
    pub owner_name: Option<String>,
    pub subject_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Point this item at a new object. Location fields only ever change
    /// together.
    pub fn relocate(&mut self, storage_type: StorageType, locator: String, now: DateTime<Utc>) {
        self.storage_type = storage_type;
        self.locator = locator;
        self.updated_at = now;
    }
}

/// A catalog entry that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCatalogItem {
    pub scope: String,
    pub kind: MediaKind,
    pub storage_type: StorageType,
    pub locator: String,
    pub file_name: String,
    pub size: u64,
    pub owner_name: Option<String>,
    pub subject_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Which items a migration may consider.
///
/// `source` is always applied, so items that already moved off the source
/// backend are never eligible again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityFilter {
    pub source: StorageType,
    pub scope: Option<String>,
    pub kind: Option<MediaKind>,
}

impl EligibilityFilter {
    pub fn new(source: StorageType, filters: &MigrationFilters) -> Self {
        Self {
            source,
            scope: filters.scope.clone(),
            kind: filters.kind,
        }
    }
}

/// Contract between the migration engine and the catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Aggregate count and size of eligible items.
    async fn count_eligible(&self, filter: &EligibilityFilter)
    -> Result<PendingSummary, CatalogError>;

    /// Up to `limit` eligible items with `id > after_id`, ordered by id.
    async fn fetch_batch(
        &self,
        filter: &EligibilityFilter,
        after_id: ItemId,
        limit: u32,
    ) -> Result<Vec<CatalogItem>, CatalogError>;

    /// Persist the location fields of `items` in a single transaction.
    async fn commit_batch(&self, items: &[CatalogItem]) -> Result<(), CatalogError>;
}
