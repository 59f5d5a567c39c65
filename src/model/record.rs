//! Committed annotations and per-type aggregates.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::CellIndex;

/// Unique identifier for a committed annotation record.
pub type RecordId = u64;

/// A group of cells saved together under one cell type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: RecordId,
    pub cell_indices: BTreeSet<CellIndex>,
    pub cell_type: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl AnnotationRecord {
    pub fn new(
        id: RecordId,
        cell_indices: BTreeSet<CellIndex>,
        cell_type: impl Into<String>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            id,
            cell_indices,
            cell_type: cell_type.into(),
            timestamp_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.cell_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_indices.is_empty()
    }
}

/// Number of committed cells per cell type. Types that drop to zero are
/// removed entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeCounts(BTreeMap<String, usize>);

impl TypeCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cell_type: &str, count: usize) {
        if count == 0 {
            return;
        }
        *self.0.entry(cell_type.to_string()).or_insert(0) += count;
    }

    /// Subtract `count`, removing the entry when it reaches zero.
    pub fn remove(&mut self, cell_type: &str, count: usize) {
        let Some(current) = self.0.get_mut(cell_type) else {
            return;
        };
        *current = current.saturating_sub(count);
        if *current == 0 {
            self.0.remove(cell_type);
        }
    }

    pub fn get(&self, cell_type: &str) -> usize {
        self.0.get(cell_type).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}
