//! Cell registry: every candidate cell known for the current slide.

use std::collections::HashMap;

use ebat_geometry::Point;

use crate::data::DetectionRow;
use crate::model::{Cell, CellIndex};

/// Ordered store of the slide's cells, addressable by [`CellIndex`].
///
/// Detected cells are numbered in the order they were accepted; synthetic
/// (hand-drawn) cells get indices counting down from `-1`.
#[derive(Debug, Clone)]
pub struct CellRegistry {
    cells: Vec<Cell>,
    positions: HashMap<CellIndex, usize>,
    next_synthetic: CellIndex,
    dropped_rows: usize,
}

impl Default for CellRegistry {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            positions: HashMap::new(),
            next_synthetic: -1,
            dropped_rows: 0,
        }
    }
}

impl CellRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry contents with cells built from `rows`.
    ///
    /// Never fails: rows that cannot become a cell are logged and skipped.
    pub fn ingest(&mut self, rows: &[DetectionRow]) -> &[Cell] {
        self.clear();

        for (row_number, row) in rows.iter().enumerate() {
            match row.to_cell() {
                Ok(cell) => {
                    let index = self.cells.len() as CellIndex;
                    self.insert(Cell {
                        index,
                        ..cell.with_row(row_number)
                    });
                }
                Err(defect) => {
                    self.dropped_rows += 1;
                    log::warn!("Dropping detection row {}: {}", row_number, defect);
                }
            }
        }

        log::info!(
            "Ingested {} cells ({} rows dropped)",
            self.cells.len(),
            self.dropped_rows
        );
        &self.cells
    }

    /// Add a synthetic cell and return its assigned index.
    pub fn append(&mut self, mut cell: Cell) -> CellIndex {
        let index = self.next_synthetic;
        self.next_synthetic -= 1;
        cell.index = index;
        log::debug!("Appended synthetic cell {} ({:?})", index, cell.source);
        self.insert(cell);
        index
    }

    fn insert(&mut self, cell: Cell) {
        self.positions.insert(cell.index, self.cells.len());
        self.cells.push(cell);
    }

    /// The cell whose centroid is closest to `point`, if within `max_distance`.
    ///
    /// Ties keep the first cell encountered.
    pub fn nearest(&self, point: Point, max_distance: f32) -> Option<CellIndex> {
        let limit = max_distance * max_distance;
        let mut best: Option<(CellIndex, f32)> = None;
        for cell in &self.cells {
            let d2 = cell.centroid.distance_squared(&point);
            if d2 > limit {
                continue;
            }
            if best.is_none_or(|(_, best_d2)| d2 < best_d2) {
                best = Some((cell.index, d2));
            }
        }
        best.map(|(index, _)| index)
    }

    /// The first cell whose outline contains `point`.
    pub fn hit_test(&self, point: Point) -> Option<CellIndex> {
        self.cells
            .iter()
            .find(|cell| cell.contains(&point))
            .map(|cell| cell.index)
    }

    pub fn get(&self, index: CellIndex) -> Option<&Cell> {
        self.positions.get(&index).map(|&pos| &self.cells[pos])
    }

    pub fn contains(&self, index: CellIndex) -> bool {
        self.positions.contains_key(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.iter()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Rows skipped by the last [`ingest`](Self::ingest).
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.positions.clear();
        self.next_synthetic = -1;
        self.dropped_rows = 0;
    }
}
