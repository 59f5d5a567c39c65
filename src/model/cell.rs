//! Cell data model: one detected or hand-drawn region of interest.

use ebat_geometry::{BoundingBox, Point, polygon_bounds, polygon_centroid, polygon_contains};
use serde::{Deserialize, Serialize};

use crate::constants::{BBOX_EPSILON, MANUAL_CELL_SCORE};

/// Stable identifier of a cell within one slide's registry.
///
/// Cells ingested from the detection CSV are numbered `0, 1, 2, ...`;
/// hand-drawn cells count down from `-1` so the two never collide.
pub type CellIndex = i64;

/// How a cell entered the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellSource {
    /// Row of the detection CSV
    Detected,
    /// Polygon placed point by point
    ManualPoint,
    /// Freehand stroke
    ManualFreehand,
}

impl CellSource {
    pub fn is_manual(&self) -> bool {
        !matches!(self, CellSource::Detected)
    }
}

/// A candidate cell on the current slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Assigned by the registry.
    pub index: CellIndex,
    /// Image-pixel bounds; never thinner than [`BBOX_EPSILON`].
    pub bbox: BoundingBox,
    /// Outline vertices. When absent the bounding box is the outline.
    pub polygon: Option<Vec<Point>>,
    pub centroid: Point,
    /// Detection confidence in `[0, 1]`.
    pub score: f32,
    /// Class label from the detector (0 for hand-drawn cells).
    pub label: i32,
    pub source: CellSource,
    /// Source CSV row, for diagnostics.
    pub row: Option<usize>,
}

impl Cell {
    /// Build a cell from a box and optional outline.
    ///
    /// The centroid is the vertex mean when a polygon is given, otherwise the
    /// box midpoint. Returns `None` if that centroid is not finite. The index
    /// is left at 0 for the registry to assign.
    pub fn new(
        bbox: BoundingBox,
        polygon: Option<Vec<Point>>,
        score: f32,
        label: i32,
        source: CellSource,
    ) -> Option<Self> {
        let polygon = polygon.filter(|p| !p.is_empty());
        let centroid = match &polygon {
            Some(vertices) => polygon_centroid(vertices)?,
            None => bbox.center(),
        };
        if !centroid.is_finite() {
            return None;
        }

        Some(Self {
            index: 0,
            bbox: bbox.widened(BBOX_EPSILON),
            polygon,
            centroid,
            score: if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 },
            label,
            source,
            row: None,
        })
    }

    /// Build a hand-drawn cell from an outline.
    ///
    /// A duplicated closing vertex is dropped before the bounds and centroid
    /// are computed. Non-finite coordinates are coerced to 0.
    pub fn from_outline(vertices: &[Point], source: CellSource) -> Option<Self> {
        let mut ring: Vec<Point> = vertices
            .iter()
            .map(|p| {
                Point::new(
                    if p.x.is_finite() { p.x } else { 0.0 },
                    if p.y.is_finite() { p.y } else { 0.0 },
                )
            })
            .collect();
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }

        let bbox = polygon_bounds(&ring)?;
        Self::new(bbox, Some(ring), MANUAL_CELL_SCORE, 0, source)
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    /// Outline vertices: the polygon, or the four box corners.
    pub fn outline(&self) -> Vec<Point> {
        match &self.polygon {
            Some(vertices) => vertices.clone(),
            None => vec![
                Point::new(self.bbox.x0, self.bbox.y0),
                Point::new(self.bbox.x1, self.bbox.y0),
                Point::new(self.bbox.x1, self.bbox.y1),
                Point::new(self.bbox.x0, self.bbox.y1),
            ],
        }
    }

    /// Whether `point` falls inside the cell's outline.
    ///
    /// Polygons with fewer than 3 vertices enclose nothing, so the box is used.
    pub fn contains(&self, point: &Point) -> bool {
        match &self.polygon {
            Some(vertices) if vertices.len() >= 3 => polygon_contains(vertices, point),
            _ => self.bbox.contains(point),
        }
    }
}
