//! Transient overlay state: the points drawn over the slide while a selection
//! is being built, and the candidates accumulated for cumulative detection.

use ebat_geometry::Point;
use serde::{Deserialize, Serialize};

use super::CellIndex;

/// Identifier of one similarity-detection response.
pub type BatchId = u64;

/// Where a displayed point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointSource {
    /// User clicked a detected cell
    Manual,
    /// User drew a new cell
    ManualDraw,
    /// Returned by the similarity service
    AutoSimilar,
}

/// A point rendered over the slide for the current working selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayPoint {
    /// Image-pixel position
    pub position: Point,
    pub source: PointSource,
    pub score: f32,
    /// The registry cell this point stands for. `None` for similarity
    /// results that matched no cell; those are shown but never committed.
    pub cell: Option<CellIndex>,
    /// Detection batch that produced this point, for auto points.
    pub batch: Option<BatchId>,
}

impl DisplayPoint {
    pub fn manual(position: Point, score: f32, cell: CellIndex) -> Self {
        Self {
            position,
            source: PointSource::Manual,
            score,
            cell: Some(cell),
            batch: None,
        }
    }

    pub fn drawn(position: Point, cell: CellIndex) -> Self {
        Self {
            position,
            source: PointSource::ManualDraw,
            score: crate::constants::MANUAL_CELL_SCORE,
            cell: Some(cell),
            batch: None,
        }
    }

    pub fn auto(position: Point, score: f32, cell: Option<CellIndex>, batch: BatchId) -> Self {
        Self {
            position,
            source: PointSource::AutoSimilar,
            score,
            cell,
            batch: Some(batch),
        }
    }

    pub fn is_auto(&self) -> bool {
        self.source == PointSource::AutoSimilar
    }
}

/// A similarity result remembered for seeding later cumulative requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub position: Point,
    pub score: f32,
    pub cell: Option<CellIndex>,
    pub batch: BatchId,
}
