// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! SQLite-backed catalog store

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tokio::sync::Mutex;
use tracing::warn;

use media_migration_types::{ItemId, MediaKind, PendingSummary, StorageType};

use crate::{CatalogError, CatalogItem, CatalogStore, EligibilityFilter, NewCatalogItem};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS media_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scope TEXT NOT NULL,
        kind TEXT NOT NULL,
        storage_type TEXT NOT NULL,
        locator TEXT NOT NULL,
        file_name TEXT NOT NULL,
        size INTEGER NOT NULL,
        owner_name TEXT,
        subject_name TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_media_items_storage ON media_items(storage_type, id);
"#;

const ITEM_COLUMNS: &str = "id, scope, kind, storage_type, locator, file_name, size, \
                            owner_name, subject_name, created_at, updated_at";

/// Stored kind as `MediaKind::from_stored` reads it: case-insensitive, and
/// anything unrecognised is `other`.
const KIND_EXPR: &str = "CASE lower(kind) \
     WHEN 'image' THEN 'image' WHEN 'video' THEN 'video' \
     WHEN 'audio' THEN 'audio' WHEN 'document' THEN 'document' \
     ELSE 'other' END";

/// Shared filter clause; `?1` source, `?2` scope, `?3` kind
fn eligible_where() -> String {
    format!(
        "storage_type = ?1 AND (?2 IS NULL OR scope = ?2) AND (?3 IS NULL OR {} = ?3)",
        KIND_EXPR
    )
}

/// SQLite catalog store
#[derive(Clone)]
pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalog {
    /// Open (or create) a catalog database file
    pub fn open(db_path: &Path) -> Result<Self, CatalogError> {
        Self::init(Connection::open(db_path)?)
    }

    /// A private in-memory catalog, used by tests and dry experiments
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Add an item, returning its id
    pub async fn insert(&self, item: &NewCatalogItem) -> Result<ItemId, CatalogError> {
        let size = i64::try_from(item.size)
            .map_err(|_| CatalogError::Invalid(format!("size {} out of range", item.size)))?;
        let created_at = format_time(&item.created_at);

        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO media_items
               (scope, kind, storage_type, locator, file_name, size,
                owner_name, subject_name, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)"#,
            params![
                item.scope,
                item.kind.to_string(),
                item.storage_type.to_string(),
                item.locator,
                item.file_name,
                size,
                item.owner_name,
                item.subject_name,
                created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Look up a single item
    pub async fn get(&self, id: ItemId) -> Result<CatalogItem, CatalogError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {} FROM media_items WHERE id = ?1", ITEM_COLUMNS),
            params![id],
            item_from_row,
        )
        .optional()?
        .ok_or(CatalogError::NotFound(id))
    }

    /// Remove an item
    pub async fn remove(&self, id: ItemId) -> Result<(), CatalogError> {
        let conn = self.conn.lock().await;
        let rows = conn.execute("DELETE FROM media_items WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }
}

fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogItem> {
    let kind: String = row.get(2)?;
    let storage_type: String = row.get(3)?;
    let storage_type = storage_type
        .parse::<StorageType>()
        .map_err(|e| conversion_error(3, e))?;
    let size: i64 = row.get(6)?;
    let size = u64::try_from(size).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, Type::Integer, Box::new(e))
    })?;

    Ok(CatalogItem {
        id: row.get(0)?,
        scope: row.get(1)?,
        kind: MediaKind::from_stored(&kind),
        storage_type,
        locator: row.get(4)?,
        file_name: row.get(5)?,
        size,
        owner_name: row.get(7)?,
        subject_name: row.get(8)?,
        created_at: time_column(row, 9)?,
        updated_at: time_column(row, 10)?,
    })
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn count_eligible(
        &self,
        filter: &EligibilityFilter,
    ) -> Result<PendingSummary, CatalogError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {kind} AS norm_kind, scope, COUNT(*), COALESCE(SUM(size), 0) \
             FROM media_items WHERE {filter} GROUP BY norm_kind, scope",
            kind = KIND_EXPR,
            filter = eligible_where()
        ))?;

        let groups = stmt
            .query_map(
                params![
                    filter.source.to_string(),
                    filter.scope,
                    filter.kind.map(|k| k.to_string()),
                ],
                |row| {
                    let kind: String = row.get(0)?;
                    let scope: String = row.get(1)?;
                    let count: i64 = row.get(2)?;
                    let bytes: i64 = row.get(3)?;
                    Ok((kind, scope, count, bytes))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut summary = PendingSummary::default();
        for (kind, scope, count, bytes) in groups {
            let count = u64::try_from(count).unwrap_or_default();
            let bytes = u64::try_from(bytes).unwrap_or_default();
            summary.count += count;
            summary.total_bytes += bytes;
            summary
                .by_kind
                .entry(MediaKind::from_stored(&kind))
                .or_default()
                .add(count, bytes);
            summary.by_scope.entry(scope).or_default().add(count, bytes);
        }

        Ok(summary)
    }

    async fn fetch_batch(
        &self,
        filter: &EligibilityFilter,
        after_id: ItemId,
        limit: u32,
    ) -> Result<Vec<CatalogItem>, CatalogError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM media_items WHERE {} AND id > ?4 ORDER BY id ASC LIMIT ?5",
            ITEM_COLUMNS,
            eligible_where()
        ))?;

        let items = stmt
            .query_map(
                params![
                    filter.source.to_string(),
                    filter.scope,
                    filter.kind.map(|k| k.to_string()),
                    after_id,
                    limit,
                ],
                item_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    async fn commit_batch(&self, items: &[CatalogItem]) -> Result<(), CatalogError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE media_items SET locator = ?1, storage_type = ?2, updated_at = ?3 \
                 WHERE id = ?4",
            )?;
            for item in items {
                let rows = stmt.execute(params![
                    item.locator,
                    item.storage_type.to_string(),
                    format_time(&item.updated_at),
                    item.id,
                ])?;
                if rows == 0 {
                    // Removed from the catalog while its object was in flight
                    warn!(item_id = item.id, "Catalog item vanished before commit");
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
