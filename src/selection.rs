//! Selection state machine.
//!
//! Every registry cell is in exactly one of four states:
//!
//! ```text
//! Unselected ──toggle──> UserSelected ──toggle──> Unselected
//! Unselected ──similarity result──> AutoSelected ──toggle──> Unselected
//! UserSelected | AutoSelected ──commit──> Committed (sticky)
//! ```
//!
//! Alongside the three index sets this module owns the working overlay (the
//! points drawn over the slide) and the candidates accumulated for cumulative
//! similarity requests. Undo bookkeeping lives in [`crate::undo`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DUPLICATE_TOLERANCE, MATCH_TOLERANCE, OTHERS_CELL_TYPE, SEED_LABEL_PREFIX,
};
use crate::detection::{CommitRow, SeedRow, SimilarityMode, SimilarityResult};
use crate::error::EngineError;
use crate::model::{
    AnnotationRecord, BatchId, Candidate, Cell, CellIndex, DisplayPoint, RecordId, TypeCounts,
};
use crate::registry::CellRegistry;

// ============================================================================
// Supporting types
// ============================================================================

/// Pixel distances used when folding similarity results into the selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchTolerances {
    /// A result matches the nearest centroid within this distance
    pub match_distance: f32,
    /// A result this close to an existing auto point is a duplicate
    pub duplicate_distance: f32,
}

impl Default for MatchTolerances {
    fn default() -> Self {
        Self {
            match_distance: MATCH_TOLERANCE,
            duplicate_distance: DUPLICATE_TOLERANCE,
        }
    }
}

/// What a toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Unselected cell became user-selected
    Selected,
    /// User-selected cell was deselected
    Deselected,
    /// Auto-selected cell was dropped back to unselected
    Demoted,
}

/// Result of folding one similarity response into the selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub batch: BatchId,
    /// Cells newly auto-selected, in response order
    pub selected: Vec<CellIndex>,
    /// Overlay points added (matched and unmatched)
    pub points: Vec<DisplayPoint>,
    /// Candidates appended for later cumulative requests
    pub candidates: Vec<Candidate>,
    /// Results that matched no cell
    pub unmatched: usize,
    /// Results dropped for landing on an existing auto point
    pub duplicates: usize,
    /// Results naming an annotated or hand-picked cell
    pub skipped: usize,
}

impl BatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.candidates.is_empty()
    }
}

/// Counts shown in the statistics panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectionStats {
    pub total_cells: usize,
    pub user_selected: usize,
    pub auto_selected: usize,
    /// `user_selected + auto_selected`
    pub selected: usize,
    pub annotated: usize,
    /// Annotated share of all cells, in percent
    pub progress_percent: f32,
}

// ============================================================================
// Selection state
// ============================================================================

/// Selection sets, overlay, and committed annotations for one slide.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    user_selected: BTreeSet<CellIndex>,
    auto_selected: BTreeSet<CellIndex>,
    committed: BTreeSet<CellIndex>,
    points: Vec<DisplayPoint>,
    candidates: Vec<Candidate>,
    records: Vec<AnnotationRecord>,
    type_counts: TypeCounts,
    next_record_id: RecordId,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn user_selected(&self) -> &BTreeSet<CellIndex> {
        &self.user_selected
    }

    pub fn auto_selected(&self) -> &BTreeSet<CellIndex> {
        &self.auto_selected
    }

    pub fn committed(&self) -> &BTreeSet<CellIndex> {
        &self.committed
    }

    /// The displayed selection: user-selected and auto-selected cells.
    pub fn selected(&self) -> BTreeSet<CellIndex> {
        self.user_selected
            .union(&self.auto_selected)
            .copied()
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.user_selected.len() + self.auto_selected.len()
    }

    pub fn is_selected(&self, index: CellIndex) -> bool {
        self.user_selected.contains(&index) || self.auto_selected.contains(&index)
    }

    pub fn is_committed(&self, index: CellIndex) -> bool {
        self.committed.contains(&index)
    }

    pub fn points(&self) -> &[DisplayPoint] {
        &self.points
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn records(&self) -> &[AnnotationRecord] {
        &self.records
    }

    pub fn type_counts(&self) -> &TypeCounts {
        &self.type_counts
    }

    /// Whether any working (uncommitted) state exists.
    pub fn has_working_state(&self) -> bool {
        !(self.user_selected.is_empty()
            && self.auto_selected.is_empty()
            && self.points.is_empty()
            && self.candidates.is_empty())
    }

    pub fn stats(&self, total_cells: usize) -> SelectionStats {
        let annotated = self.committed.len();
        let progress_percent = if total_cells == 0 {
            0.0
        } else {
            annotated as f32 / total_cells as f32 * 100.0
        };
        SelectionStats {
            total_cells,
            user_selected: self.user_selected.len(),
            auto_selected: self.auto_selected.len(),
            selected: self.selected_count(),
            annotated,
            progress_percent,
        }
    }

    // ------------------------------------------------------------------------
    // Manual selection
    // ------------------------------------------------------------------------

    /// Flip a cell's selection.
    ///
    /// Committed cells are rejected. Auto-selected cells are demoted to
    /// unselected rather than promoted, and their overlay points and
    /// candidates are evicted.
    pub fn toggle(
        &mut self,
        index: CellIndex,
        registry: &CellRegistry,
    ) -> Result<ToggleOutcome, EngineError> {
        let cell = registry
            .get(index)
            .ok_or(EngineError::UnknownCell { index })?;
        if self.committed.contains(&index) {
            return Err(EngineError::AlreadyCommitted { index });
        }

        if self.auto_selected.remove(&index) {
            self.evict(index);
            self.candidates.retain(|c| c.cell != Some(index));
            log::debug!("Demoted auto-selected cell {}", index);
            return Ok(ToggleOutcome::Demoted);
        }

        if self.user_selected.remove(&index) {
            self.evict(index);
            log::debug!("Deselected cell {}", index);
            return Ok(ToggleOutcome::Deselected);
        }

        self.user_selected.insert(index);
        self.points
            .push(DisplayPoint::manual(cell.centroid, cell.score, index));
        log::debug!("Selected cell {}", index);
        Ok(ToggleOutcome::Selected)
    }

    /// Add a freshly drawn cell to the user selection.
    pub fn select_drawn(&mut self, cell: &Cell) {
        self.user_selected.insert(cell.index);
        self.points.push(DisplayPoint::drawn(cell.centroid, cell.index));
    }

    fn evict(&mut self, index: CellIndex) {
        self.points.retain(|p| p.cell != Some(index));
    }

    // ------------------------------------------------------------------------
    // Similarity expansion
    // ------------------------------------------------------------------------

    /// Seed rows for a similarity request: every registry cell, flagged as
    /// selected according to `mode`.
    ///
    /// `UserOnly` flags hand-picked cells. `Cumulative` also flags
    /// auto-selected cells and every matched candidate accumulated so far.
    pub fn seed_rows(&self, mode: SimilarityMode, registry: &CellRegistry) -> Vec<SeedRow> {
        let flagged: BTreeSet<CellIndex> = match mode {
            SimilarityMode::UserOnly => self.user_selected.clone(),
            SimilarityMode::Cumulative => self
                .selected()
                .into_iter()
                .chain(self.candidates.iter().filter_map(|c| c.cell))
                .collect(),
        };

        registry
            .iter()
            .map(|cell| SeedRow {
                label: format!("{}{}", SEED_LABEL_PREFIX, cell.index),
                x: cell.centroid.x,
                y: cell.centroid.y,
                score: cell.score,
                selected: flagged.contains(&cell.index),
            })
            .collect()
    }

    /// Fold a similarity response into the selection as one batch.
    ///
    /// A result labelled `cell_<n>` naming a registry cell matches it
    /// directly; otherwise it matches the nearest centroid within the match
    /// tolerance. Results near an existing auto point are dropped as
    /// duplicates, and results on annotated or hand-picked cells are
    /// skipped. Unmatched results still get an overlay point but can never
    /// be committed. In cumulative mode every result is also remembered as a
    /// candidate.
    pub fn apply_similarity_results(
        &mut self,
        results: &[SimilarityResult],
        batch: BatchId,
        mode: SimilarityMode,
        registry: &CellRegistry,
        tolerances: &MatchTolerances,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            batch,
            ..BatchOutcome::default()
        };
        let duplicate_limit = tolerances.duplicate_distance * tolerances.duplicate_distance;

        for result in results {
            if !result.position.is_finite() {
                continue;
            }
            let cell = match_result(result, registry, tolerances.match_distance);

            let is_duplicate = self.points.iter().any(|p| {
                p.is_auto() && p.position.distance_squared(&result.position) <= duplicate_limit
            });
            if is_duplicate {
                outcome.duplicates += 1;
                continue;
            }

            if let Some(index) = cell {
                if self.committed.contains(&index) || self.user_selected.contains(&index) {
                    outcome.skipped += 1;
                    continue;
                }
                if self.auto_selected.insert(index) {
                    outcome.selected.push(index);
                }
            } else {
                outcome.unmatched += 1;
            }

            let point = DisplayPoint::auto(result.position, result.score, cell, batch);
            self.points.push(point.clone());
            outcome.points.push(point);
        }

        if mode == SimilarityMode::Cumulative {
            for result in results {
                let candidate = Candidate {
                    position: result.position,
                    score: result.score,
                    cell: registry.nearest(result.position, tolerances.match_distance),
                    batch,
                };
                self.candidates.push(candidate.clone());
                outcome.candidates.push(candidate);
            }
        }

        log::info!(
            "Similarity batch {}: {} cells selected, {} unmatched, {} duplicates, {} skipped",
            batch,
            outcome.selected.len(),
            outcome.unmatched,
            outcome.duplicates,
            outcome.skipped
        );
        outcome
    }

    // ------------------------------------------------------------------------
    // Undo support
    // ------------------------------------------------------------------------

    /// Reverse a manual selection of `index`.
    pub(crate) fn revert_manual(&mut self, index: CellIndex) {
        if self.user_selected.remove(&index) {
            self.evict(index);
        }
    }

    /// Re-apply a manual selection; skipped if the cell is now taken.
    pub(crate) fn restore_manual(&mut self, point: &DisplayPoint) -> bool {
        let Some(index) = point.cell else {
            return false;
        };
        if self.committed.contains(&index) || self.is_selected(index) {
            return false;
        }
        self.user_selected.insert(index);
        self.points.push(point.clone());
        true
    }

    /// Remove everything one similarity batch added.
    pub(crate) fn revert_auto_batch(&mut self, batch: BatchId, indices: &[CellIndex]) {
        for index in indices {
            self.auto_selected.remove(index);
        }
        self.points.retain(|p| p.batch != Some(batch));
        self.candidates.retain(|c| c.batch != batch);
    }

    /// Re-apply an undone batch, leaving out cells that were annotated or
    /// selected in the meantime. Returns the cells auto-selected again.
    pub(crate) fn restore_auto_batch(
        &mut self,
        indices: &[CellIndex],
        points: &[DisplayPoint],
        candidates: &[Candidate],
    ) -> Vec<CellIndex> {
        let restored: Vec<CellIndex> = indices
            .iter()
            .copied()
            .filter(|i| !self.committed.contains(i) && !self.is_selected(*i))
            .collect();
        self.auto_selected.extend(restored.iter().copied());

        let taken = |cell: Option<CellIndex>| {
            cell.is_some_and(|i| self.committed.contains(&i) || self.user_selected.contains(&i))
        };
        let kept_points: Vec<DisplayPoint> =
            points.iter().filter(|p| !taken(p.cell)).cloned().collect();
        self.points.extend(kept_points);
        self.candidates.extend(candidates.iter().cloned());
        restored
    }

    /// Drop all working state: both selection sets, overlay, candidates.
    pub fn clear_working(&mut self) {
        self.user_selected.clear();
        self.auto_selected.clear();
        self.points.clear();
        self.candidates.clear();
    }

    // ------------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------------

    /// Commit `indices` under `cell_type` as one annotation record.
    ///
    /// Every index must be in the displayed selection. On success the
    /// working state is cleared.
    pub fn commit(
        &mut self,
        indices: &BTreeSet<CellIndex>,
        cell_type: &str,
        timestamp_ms: u64,
    ) -> Result<&AnnotationRecord, EngineError> {
        let cell_type = cell_type.trim();
        if indices.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        if cell_type.is_empty() {
            return Err(EngineError::BlankCellType);
        }
        // The catch-all entry stands in for a name the annotator has to type
        if cell_type == OTHERS_CELL_TYPE {
            return Err(EngineError::UnspecifiedCellType);
        }
        for &index in indices {
            if self.committed.contains(&index) {
                return Err(EngineError::AlreadyCommitted { index });
            }
            if !self.is_selected(index) {
                return Err(EngineError::NotSelected { index });
            }
        }

        self.committed.extend(indices.iter().copied());
        self.type_counts.add(cell_type, indices.len());
        self.clear_working();

        let id = self.next_record_id;
        self.next_record_id += 1;
        log::debug!(
            "Committed record {}: {} cells as '{}'",
            id,
            indices.len(),
            cell_type
        );
        self.records.push(AnnotationRecord::new(
            id,
            indices.clone(),
            cell_type,
            timestamp_ms,
        ));
        Ok(&self.records[self.records.len() - 1])
    }

    /// Commit the whole displayed selection.
    pub fn commit_selection(
        &mut self,
        cell_type: &str,
        timestamp_ms: u64,
    ) -> Result<&AnnotationRecord, EngineError> {
        let indices = self.selected();
        self.commit(&indices, cell_type, timestamp_ms)
    }

    /// Return one committed cell to unselected.
    ///
    /// The cell leaves its record (the record is deleted once empty) and
    /// its type count is decremented.
    pub fn remove_committed(&mut self, index: CellIndex) -> Result<String, EngineError> {
        if !self.committed.remove(&index) {
            return Err(EngineError::NotCommitted { index });
        }

        let mut cell_type = String::new();
        if let Some(pos) = self
            .records
            .iter()
            .position(|r| r.cell_indices.contains(&index))
        {
            let record = &mut self.records[pos];
            record.cell_indices.remove(&index);
            cell_type = record.cell_type.clone();
            if record.is_empty() {
                log::debug!("Record {} is empty, removing", record.id);
                self.records.remove(pos);
            }
        }
        self.type_counts.remove(&cell_type, 1);
        log::debug!("Removed annotation of cell {} ('{}')", index, cell_type);
        Ok(cell_type)
    }

    /// Delete a whole record, returning its cells to unselected.
    pub fn delete_record(&mut self, id: RecordId) -> Result<AnnotationRecord, EngineError> {
        let pos = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or(EngineError::UnknownRecord { id })?;
        let record = self.records.remove(pos);
        for index in &record.cell_indices {
            self.committed.remove(index);
        }
        self.type_counts.remove(&record.cell_type, record.len());
        log::debug!("Deleted record {} ({} cells)", id, record.len());
        Ok(record)
    }

    /// Rows for the commit sink: one per committed cell still in the registry.
    pub fn commit_rows(&self, registry: &CellRegistry) -> Vec<CommitRow> {
        self.records
            .iter()
            .flat_map(|record| {
                record.cell_indices.iter().filter_map(|&index| {
                    registry.get(index).map(|cell| CommitRow {
                        bbox: cell.bbox,
                        polygon: cell.polygon.clone(),
                        score: cell.score,
                        cell_type: record.cell_type.clone(),
                    })
                })
            })
            .collect()
    }

    /// Reset everything, committed annotations included.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Resolve a similarity result to a registry cell.
fn match_result(
    result: &SimilarityResult,
    registry: &CellRegistry,
    match_distance: f32,
) -> Option<CellIndex> {
    let labelled = result
        .label
        .as_deref()
        .and_then(|label| label.strip_prefix(SEED_LABEL_PREFIX))
        .and_then(|n| n.trim().parse::<CellIndex>().ok())
        .filter(|&index| registry.contains(index));
    labelled.or_else(|| registry.nearest(result.position, match_distance))
}
