//! Key-based duplicate detection and cleanup over the persisted corpus.
//!
//! First occurrence of a key is authoritative. `dedupe` is the periodic
//! cleanup pass; `is_duplicate` is the single-record gate used on publish.

use std::collections::BTreeMap;

use serde::Serialize;

use super::key::{DedupeKey, Row};
use super::store::{RowStore, StoreError};

/// Cells shown per duplicate group in a preview.
const PREVIEW_SAMPLE_CELLS: usize = 5;

/// Summary of one dedupe pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupeResult {
    pub total_rows: usize,
    pub unique_rows: usize,
    pub duplicates_found: usize,
    /// Zero on a dry run.
    pub duplicates_removed: usize,
    /// Data rows the store holds after the pass: `total_rows` when nothing
    /// was removed, `unique_rows` after an applied cleanup.
    pub rows_written: usize,
}

/// One duplicated key as an operator would see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicatePreview {
    pub key: String,
    /// 1-based store row numbers; the header is row 1.
    pub row_numbers: Vec<usize>,
    pub count: usize,
    pub sample: Vec<String>,
}

/// Groups of data-row indices sharing a key, for keys seen more than once.
/// Indices are 0-based over `rows` and ascending within each group.
pub fn find_duplicates(rows: &[Row], key: &DedupeKey) -> BTreeMap<String, Vec<usize>> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, row) in rows.iter().enumerate() {
        groups.entry(key.key_for(row)).or_default().push(index);
    }
    groups.retain(|_, indexes| indexes.len() > 1);
    groups
}

/// True when `candidate` shares a key with any row in `existing`.
pub fn is_duplicate(candidate: &[String], existing: &[Row], key: &DedupeKey) -> bool {
    let candidate_key = key.key_for(candidate);
    existing.iter().any(|row| key.key_for(row) == candidate_key)
}

pub struct Deduplicator<'s> {
    store: &'s dyn RowStore,
    key: DedupeKey,
}

impl<'s> Deduplicator<'s> {
    pub fn new(store: &'s dyn RowStore, key: DedupeKey) -> Self {
        Self { store, key }
    }

    /// Remove all but the first row per key. A dry run only counts.
    pub fn dedupe(&self, dry_run: bool) -> Result<DedupeResult, StoreError> {
        let rows = self.store.get_existing_rows()?;
        let data = rows.get(1..).unwrap_or_default();

        let groups = find_duplicates(data, &self.key);
        let duplicates_found: usize = groups.values().map(|g| g.len() - 1).sum();

        let mut result = DedupeResult {
            total_rows: data.len(),
            unique_rows: data.len() - duplicates_found,
            duplicates_found,
            duplicates_removed: 0,
            rows_written: data.len(),
        };

        if dry_run || duplicates_found == 0 {
            tracing::info!(
                total = result.total_rows,
                duplicates = duplicates_found,
                dry_run,
                "Dedupe pass made no changes"
            );
            return Ok(result);
        }

        let mut remove = vec![false; data.len()];
        for group in groups.values() {
            for index in &group[1..] {
                remove[*index] = true;
            }
        }
        let kept: Vec<Row> = data
            .iter()
            .zip(&remove)
            .filter(|(_, removed)| !**removed)
            .map(|(row, _)| row.clone())
            .collect();

        self.store.replace_data_rows(&kept)?;

        result.duplicates_removed = duplicates_found;
        result.rows_written = kept.len();
        tracing::info!(
            removed = result.duplicates_removed,
            kept = result.rows_written,
            "Dedupe pass rewrote store"
        );
        Ok(result)
    }

    /// First `limit` duplicate groups, ordered by key.
    pub fn preview_duplicates(&self, limit: usize) -> Result<Vec<DuplicatePreview>, StoreError> {
        let rows = self.store.get_existing_rows()?;
        let data = rows.get(1..).unwrap_or_default();

        Ok(find_duplicates(data, &self.key)
            .into_iter()
            .take(limit)
            .map(|(key, indexes)| DuplicatePreview {
                sample: data[indexes[0]]
                    .iter()
                    .take(PREVIEW_SAMPLE_CELLS)
                    .cloned()
                    .collect(),
                count: indexes.len(),
                // +1 for 1-based numbering, +1 for the header row
                row_numbers: indexes.iter().map(|i| i + 2).collect(),
                key,
            })
            .collect())
    }
}
