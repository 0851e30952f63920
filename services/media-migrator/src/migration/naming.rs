// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Destination path resolution
//!
//! Resolution never fails. It walks a fixed chain and takes the first
//! candidate whose every segment is valid:
//!
//! 1. `{owner}/{subject}/{kind}/{YYYYMMDD_HHMMSS}_{id}.{ext}` (only when
//!    renaming is requested and the naming context is complete)
//! 2. the item's current locator, split into directory and file name
//! 3. `{kind}/{id}.{ext}`

use media_catalog::CatalogItem;

/// Longest accepted path segment, in bytes
const MAX_SEGMENT_BYTES: usize = 128;

/// Longest accepted file extension
const MAX_EXTENSION_LEN: usize = 10;

const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Where an object should be written on the destination backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPath {
    pub segments: Vec<String>,
    pub file_name: String,
}

impl DestinationPath {
    /// The `/`-joined path, as shown in results.
    pub fn display_path(&self) -> String {
        let mut parts = self.segments.clone();
        parts.push(self.file_name.clone());
        parts.join("/")
    }
}

/// Compute the destination path for `item`.
pub fn resolve_destination(item: &CatalogItem, rename_files: bool) -> DestinationPath {
    if rename_files {
        if let Some(path) = from_naming_context(item) {
            return path;
        }
        tracing::debug!(
            item_id = item.id,
            "Naming context incomplete or invalid, keeping existing path"
        );
    }

    if let Some(path) = from_locator(&item.locator) {
        return path;
    }

    DestinationPath {
        segments: vec![item.kind.to_string()],
        file_name: format!("{}.{}", item.id, extension_for(item)),
    }
}

fn from_naming_context(item: &CatalogItem) -> Option<DestinationPath> {
    let owner = clean_segment(item.owner_name.as_deref()?)?;
    let subject = clean_segment(item.subject_name.as_deref()?)?;
    let file_name = format!(
        "{}_{}.{}",
        item.created_at.format("%Y%m%d_%H%M%S"),
        item.id,
        extension_for(item)
    );

    Some(DestinationPath {
        segments: vec![owner, subject, item.kind.to_string()],
        file_name,
    })
}

fn from_locator(locator: &str) -> Option<DestinationPath> {
    let mut parts: Vec<String> = locator
        .split(['/', '\\'])
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    if !parts.iter().all(|p| is_valid_segment(p)) {
        return None;
    }
    let file_name = parts.pop()?;

    Some(DestinationPath {
        segments: parts,
        file_name,
    })
}

/// Trim `raw` and return it if usable as a single path segment.
fn clean_segment(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    is_valid_segment(trimmed).then(|| trimmed.to_string())
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.len() <= MAX_SEGMENT_BYTES
        && segment != "."
        && segment != ".."
        && segment.trim() == segment
        && !segment
            .chars()
            .any(|c| c.is_control() || FORBIDDEN_CHARS.contains(&c))
}

/// Lowercased extension of the item's file name or locator, or the kind's
/// default.
fn extension_for(item: &CatalogItem) -> String {
    extension_of(&item.file_name)
        .or_else(|| extension_of(&item.locator))
        .unwrap_or_else(|| item.kind.default_extension().to_string())
}

fn extension_of(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?;
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
