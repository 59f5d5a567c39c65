//! Undo/Redo log for selection operations.
//!
//! Each entry records exactly what one action added to the working
//! selection: a single hand-picked (or hand-drawn) cell, or everything one
//! similarity response contributed. Undo pops the most recent entry and
//! reverses exactly its scope.

use crate::constants::UNDO_HISTORY_LIMIT;
use crate::model::{BatchId, Candidate, CellIndex, DisplayPoint};
use crate::selection::{BatchOutcome, SelectionState};

// ============================================================================
// Entries
// ============================================================================

/// One undoable selection action.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoEntry {
    /// A single cell added to the user selection
    Manual {
        /// The selected cell
        index: CellIndex,
        /// The overlay point added with it
        point: DisplayPoint,
    },
    /// Everything one similarity response added
    AutoBatch {
        /// Response identifier
        batch: BatchId,
        /// Cells the batch auto-selected
        indices: Vec<CellIndex>,
        /// Overlay points the batch added
        points: Vec<DisplayPoint>,
        /// Candidates the batch appended
        candidates: Vec<Candidate>,
    },
}

impl UndoEntry {
    /// Entry for a batch outcome.
    pub fn from_batch(outcome: &BatchOutcome) -> Self {
        UndoEntry::AutoBatch {
            batch: outcome.batch,
            indices: outcome.selected.clone(),
            points: outcome.points.clone(),
            candidates: outcome.candidates.clone(),
        }
    }

    /// Get a human-readable description of this entry
    pub fn description(&self) -> String {
        match self {
            UndoEntry::Manual { index, .. } => format!("Select cell {}", index),
            UndoEntry::AutoBatch { batch, points, .. } => {
                format!("Similarity batch {} ({} points)", batch, points.len())
            }
        }
    }

    /// Remove every trace of `index`; returns true when nothing is left.
    fn forget(&mut self, index: CellIndex) -> bool {
        match self {
            UndoEntry::Manual { index: own, .. } => *own == index,
            UndoEntry::AutoBatch {
                indices,
                points,
                candidates,
                ..
            } => {
                indices.retain(|i| *i != index);
                points.retain(|p| p.cell != Some(index));
                candidates.retain(|c| c.cell != Some(index));
                points.is_empty() && candidates.is_empty()
            }
        }
    }
}

// ============================================================================
// Undo log
// ============================================================================

/// Configuration for the undo log
#[derive(Debug, Clone)]
pub struct UndoConfig {
    /// Maximum number of entries to keep in history
    pub max_history: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            max_history: UNDO_HISTORY_LIMIT,
        }
    }
}

/// The undo/redo history.
///
/// Recording an entry clears the redo stack. Undo moves the newest entry to
/// the redo stack; redo moves it back.
#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    undo_stack: Vec<UndoEntry>,
    redo_stack: Vec<UndoEntry>,
    config: UndoConfig,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: UndoConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Push an entry. This clears the redo stack.
    pub fn push(&mut self, entry: UndoEntry) {
        log::debug!("📝 Undo: pushed '{}'", entry.description());
        self.undo_stack.push(entry);
        self.redo_stack.clear();

        while self.undo_stack.len() > self.config.max_history {
            self.undo_stack.remove(0);
        }
    }

    /// Record a manual selection.
    pub fn record_manual(&mut self, index: CellIndex, point: DisplayPoint) {
        self.push(UndoEntry::Manual { index, point });
    }

    /// Record a similarity batch; empty batches are not recorded.
    pub fn record_auto_batch(&mut self, outcome: &BatchOutcome) {
        if outcome.is_empty() {
            return;
        }
        self.push(UndoEntry::from_batch(outcome));
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Pop the newest entry, moving it to the redo stack.
    pub fn pop_undo(&mut self) -> Option<UndoEntry> {
        let entry = self.undo_stack.pop()?;
        log::debug!("⏪ Undo: '{}'", entry.description());
        self.redo_stack.push(entry.clone());
        Some(entry)
    }

    /// Pop the newest undone entry, moving it back to the undo stack.
    pub fn pop_redo(&mut self) -> Option<UndoEntry> {
        let entry = self.redo_stack.pop()?;
        log::debug!("⏩ Redo: '{}'", entry.description());
        self.undo_stack.push(entry.clone());
        Some(entry)
    }

    /// Drop `index` from every entry, so undo or redo never brings it back.
    pub fn forget(&mut self, index: CellIndex) {
        self.undo_stack.retain_mut(|entry| !entry.forget(index));
        self.redo_stack.retain_mut(|entry| !entry.forget(index));
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.last().map(UndoEntry::description)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(UndoEntry::description)
    }

    /// Clear all history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        log::debug!("🗑️ Undo history cleared");
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

// ============================================================================
// Undo/Redo execution
// ============================================================================

/// Undo the newest entry against `selection`.
/// Returns the entry, or None if there was nothing to undo.
pub fn undo_selection(log: &mut UndoLog, selection: &mut SelectionState) -> Option<UndoEntry> {
    let entry = log.pop_undo()?;
    match &entry {
        UndoEntry::Manual { index, .. } => {
            selection.revert_manual(*index);
            log::debug!("⏪ Undid selection of cell {}", index);
        }
        UndoEntry::AutoBatch { batch, indices, .. } => {
            selection.revert_auto_batch(*batch, indices);
            log::debug!("⏪ Undid batch {}, {} cells", batch, indices.len());
        }
    }
    Some(entry)
}

/// Redo the newest undone entry against `selection`.
///
/// Cells committed or selected since the undo are left alone.
pub fn redo_selection(log: &mut UndoLog, selection: &mut SelectionState) -> Option<UndoEntry> {
    let entry = log.pop_redo()?;
    match &entry {
        UndoEntry::Manual { index, point } => {
            if selection.restore_manual(point) {
                log::debug!("⏩ Redid selection of cell {}", index);
            } else {
                log::debug!("⏩ Cell {} is no longer free, redo skipped", index);
            }
        }
        UndoEntry::AutoBatch {
            batch,
            indices,
            points,
            candidates,
        } => {
            let restored = selection.restore_auto_batch(indices, points, candidates);
            log::debug!("⏩ Redid batch {}, {} cells", batch, restored.len());
        }
    }
    Some(entry)
}

/// Reset the working selection and the log in one step.
pub fn clear_all(log: &mut UndoLog, selection: &mut SelectionState) {
    selection.clear_working();
    log.clear();
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DetectionRow;
    use crate::detection::{SimilarityMode, SimilarityResult};
    use crate::registry::CellRegistry;
    use crate::selection::MatchTolerances;
    use std::collections::BTreeSet;

    fn registry() -> CellRegistry {
        let rows: Vec<DetectionRow> = (0..6)
            .map(|i| {
                let x = i as f32 * 100.0;
                DetectionRow::from_values(x, 0.0, x + 10.0, 10.0, 0.8, 1)
            })
            .collect();
        let mut registry = CellRegistry::new();
        registry.ingest(&rows);
        registry
    }

    fn results_for(indices: &[usize]) -> Vec<SimilarityResult> {
        indices
            .iter()
            .map(|&i| SimilarityResult::new(i as f32 * 100.0 + 5.0, 5.0, 0.7))
            .collect()
    }

    fn select(
        log: &mut UndoLog,
        selection: &mut SelectionState,
        registry: &CellRegistry,
        index: CellIndex,
    ) {
        selection.toggle(index, registry).unwrap();
        let point = selection.points().last().unwrap().clone();
        log.record_manual(index, point);
    }

    fn batch(
        log: &mut UndoLog,
        selection: &mut SelectionState,
        registry: &CellRegistry,
        id: BatchId,
        indices: &[usize],
    ) {
        let outcome = selection.apply_similarity_results(
            &results_for(indices),
            id,
            SimilarityMode::Cumulative,
            registry,
            &MatchTolerances::default(),
        );
        log.record_auto_batch(&outcome);
    }

    #[test]
    fn test_undo_auto_batch_then_empty_noop() {
        let registry = registry();
        let mut selection = SelectionState::new();
        let mut log = UndoLog::new();

        batch(&mut log, &mut selection, &registry, 1, &[2, 3, 4]);
        assert_eq!(selection.auto_selected(), &BTreeSet::from([2, 3, 4]));

        let entry = undo_selection(&mut log, &mut selection);
        assert!(matches!(entry, Some(UndoEntry::AutoBatch { .. })));
        assert!(selection.auto_selected().is_empty());
        assert!(selection.candidates().is_empty());
        assert!(selection.points().is_empty());

        assert!(undo_selection(&mut log, &mut selection).is_none());
        assert!(!selection.has_working_state());
    }

    #[test]
    fn test_consecutive_batches_undo_individually() {
        let registry = registry();
        let mut selection = SelectionState::new();
        let mut log = UndoLog::new();

        select(&mut log, &mut selection, &registry, 0);
        batch(&mut log, &mut selection, &registry, 1, &[1, 2]);
        batch(&mut log, &mut selection, &registry, 2, &[3]);

        undo_selection(&mut log, &mut selection);
        assert_eq!(selection.auto_selected(), &BTreeSet::from([1, 2]));
        assert_eq!(selection.candidates().len(), 2);

        undo_selection(&mut log, &mut selection);
        assert!(selection.auto_selected().is_empty());
        assert_eq!(selection.user_selected(), &BTreeSet::from([0]));

        undo_selection(&mut log, &mut selection);
        assert!(selection.user_selected().is_empty());
        assert!(selection.points().is_empty());
    }

    #[test]
    fn test_manual_undo_removes_one_index() {
        let registry = registry();
        let mut selection = SelectionState::new();
        let mut log = UndoLog::new();

        select(&mut log, &mut selection, &registry, 0);
        select(&mut log, &mut selection, &registry, 1);
        undo_selection(&mut log, &mut selection);
        assert_eq!(selection.user_selected(), &BTreeSet::from([0]));
        assert_eq!(selection.points().len(), 1);
    }

    #[test]
    fn test_redo_reapplies() {
        let registry = registry();
        let mut selection = SelectionState::new();
        let mut log = UndoLog::new();

        select(&mut log, &mut selection, &registry, 5);
        batch(&mut log, &mut selection, &registry, 1, &[1, 2]);
        undo_selection(&mut log, &mut selection);
        undo_selection(&mut log, &mut selection);
        assert!(!selection.has_working_state());

        redo_selection(&mut log, &mut selection);
        redo_selection(&mut log, &mut selection);
        assert_eq!(selection.user_selected(), &BTreeSet::from([5]));
        assert_eq!(selection.auto_selected(), &BTreeSet::from([1, 2]));
        assert!(!log.can_redo());
        assert_eq!(log.undo_count(), 2);
    }

    #[test]
    fn test_push_clears_redo() {
        let registry = registry();
        let mut selection = SelectionState::new();
        let mut log = UndoLog::new();

        select(&mut log, &mut selection, &registry, 0);
        undo_selection(&mut log, &mut selection);
        assert!(log.can_redo());

        select(&mut log, &mut selection, &registry, 1);
        assert!(!log.can_redo());
    }

    #[test]
    fn test_forget_deselected_cell() {
        let registry = registry();
        let mut selection = SelectionState::new();
        let mut log = UndoLog::new();

        batch(&mut log, &mut selection, &registry, 1, &[1, 2]);
        selection.toggle(2, &registry).unwrap();
        log.forget(2);

        undo_selection(&mut log, &mut selection);
        redo_selection(&mut log, &mut selection);
        assert_eq!(selection.auto_selected(), &BTreeSet::from([1]));
        assert!(selection.points().iter().all(|p| p.cell != Some(2)));
    }

    #[test]
    fn test_empty_batch_not_recorded() {
        let mut log = UndoLog::new();
        log.record_auto_batch(&BatchOutcome::default());
        assert!(!log.can_undo());
    }

    #[test]
    fn test_max_history() {
        let registry = registry();
        let mut selection = SelectionState::new();
        let mut log = UndoLog::with_config(UndoConfig { max_history: 3 });
        for i in 0..5 {
            select(&mut log, &mut selection, &registry, i);
        }
        assert_eq!(log.undo_count(), 3);
        assert_eq!(log.undo_description().as_deref(), Some("Select cell 4"));
    }

    #[test]
    fn test_clear_all_idempotent() {
        let registry = registry();
        let mut selection = SelectionState::new();
        let mut log = UndoLog::new();
        select(&mut log, &mut selection, &registry, 0);
        batch(&mut log, &mut selection, &registry, 1, &[3]);

        clear_all(&mut log, &mut selection);
        assert!(!selection.has_working_state());
        assert!(!log.can_undo());
        clear_all(&mut log, &mut selection);
        assert!(!selection.has_working_state());
    }
}
