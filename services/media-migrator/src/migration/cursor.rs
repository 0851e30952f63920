// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Stable-key batch iteration over eligible catalog items

use std::sync::Arc;

use media_catalog::{CatalogError, CatalogItem, CatalogStore, EligibilityFilter};
use media_migration_types::ItemId;

/// Walks eligible items in ascending id order, one bounded batch at a time.
///
/// Each fetch asks for `id > last seen id`, so rows inserted or deleted
/// between batches never shift the window the way an offset would.
pub struct BatchCursor {
    catalog: Arc<dyn CatalogStore>,
    filter: EligibilityFilter,
    batch_size: u32,
    total: u64,
    last_id: ItemId,
    fetched: u64,
}

impl BatchCursor {
    /// `total` bounds how many items the cursor will ever yield.
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        filter: EligibilityFilter,
        batch_size: u32,
        total: u64,
    ) -> Self {
        Self {
            catalog,
            filter,
            batch_size: batch_size.max(1),
            total,
            last_id: 0,
            fetched: 0,
        }
    }

    /// Items still allowed before the total is reached
    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.fetched)
    }

    /// Id the next batch starts after
    pub fn position(&self) -> ItemId {
        self.last_id
    }

    /// Fetch the next batch, or `None` once the total is reached or the
    /// catalog has no more eligible items.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<CatalogItem>>, CatalogError> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(None);
        }

        let limit = u64::from(self.batch_size).min(remaining) as u32;
        let batch = self
            .catalog
            .fetch_batch(&self.filter, self.last_id, limit)
            .await?;

        let Some(max_id) = batch.iter().map(|item| item.id).max() else {
            return Ok(None);
        };

        self.last_id = max_id;
        self.fetched += batch.len() as u64;
        Ok(Some(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use media_catalog::{NewCatalogItem, SqliteCatalog};
    use media_migration_types::{MediaKind, MigrationFilters, StorageType};

    async fn catalog_with(n: u64) -> Arc<SqliteCatalog> {
        let catalog = Arc::new(SqliteCatalog::open_in_memory().unwrap());
        for i in 0..n {
            catalog
                .insert(&NewCatalogItem {
                    scope: "acme".to_string(),
                    kind: MediaKind::Image,
                    storage_type: StorageType::Local,
                    locator: format!("acme/{}.jpg", i),
                    file_name: format!("{}.jpg", i),
                    size: 1,
                    owner_name: None,
                    subject_name: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        catalog
    }

    fn filter() -> EligibilityFilter {
        EligibilityFilter::new(StorageType::Local, &MigrationFilters::default())
    }

    async fn drain(cursor: &mut BatchCursor) -> Vec<usize> {
        let mut sizes = Vec::new();
        while let Some(batch) = cursor.next_batch().await.unwrap() {
            sizes.push(batch.len());
        }
        sizes
    }

    #[tokio::test]
    async fn test_batches_are_bounded_by_size_and_total() {
        let catalog = catalog_with(5).await;
        let mut cursor = BatchCursor::new(catalog, filter(), 2, 5);
        assert_eq!(drain(&mut cursor).await, vec![2, 2, 1]);
        assert_eq!(cursor.remaining(), 0);
    }

    #[tokio::test]
    async fn test_total_caps_iteration() {
        let catalog = catalog_with(10).await;
        let mut cursor = BatchCursor::new(catalog, filter(), 2, 3);
        assert_eq!(drain(&mut cursor).await, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_stops_on_empty_batch() {
        let catalog = catalog_with(3).await;
        // Total overstates what is actually there (rows removed since counting)
        let mut cursor = BatchCursor::new(catalog, filter(), 10, 8);
        assert_eq!(drain(&mut cursor).await, vec![3]);
        assert_eq!(cursor.remaining(), 5);
    }

    #[tokio::test]
    async fn test_cursor_advances_past_migrated_rows() {
        let catalog = catalog_with(4).await;
        let mut cursor = BatchCursor::new(catalog.clone(), filter(), 2, 4);

        let first = cursor.next_batch().await.unwrap().unwrap();
        assert_eq!(cursor.position(), first[1].id);

        // The first batch moves off the source; the cursor must not revisit
        // or skip anything because of it.
        let moved: Vec<_> = first
            .into_iter()
            .map(|mut item| {
                item.relocate(StorageType::Http, format!("moved/{}", item.id), Utc::now());
                item
            })
            .collect();
        catalog.commit_batch(&moved).await.unwrap();

        let second = cursor.next_batch().await.unwrap().unwrap();
        assert_eq!(second.len(), 2);
        assert!(second.iter().all(|i| i.id > moved[1].id));
        assert!(cursor.next_batch().await.unwrap().is_none());
    }
}
