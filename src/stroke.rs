//! Freehand stroke recording and click-placed polygon drafts.
//!
//! Both produce a closed, simplified outline in image pixels that the session
//! turns into a synthetic cell.

use ebat_geometry::{Point, simplify};
use serde::{Deserialize, Serialize};

use crate::constants::{AUTO_CLOSE_DISTANCE, DEFAULT_SIMPLIFY_EPSILON, MIN_STROKE_POINTS};
use crate::error::EngineError;

/// Parameters shared by strokes and polygon drafts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeConfig {
    /// Ramer-Douglas-Peucker tolerance (pixels)
    pub simplify_epsilon: f32,
    /// Fewest points that can form a cell
    pub min_points: usize,
    /// A draft closes when its last point is nearer than this to the first
    pub auto_close_distance: f32,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            simplify_epsilon: DEFAULT_SIMPLIFY_EPSILON,
            min_points: MIN_STROKE_POINTS,
            auto_close_distance: AUTO_CLOSE_DISTANCE,
        }
    }
}

/// Recorder state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StrokeState {
    /// Not recording
    #[default]
    Idle,
    /// Pointer is down; points collected so far
    Recording { points: Vec<Point> },
}

/// Simplify `points` and close the ring.
pub fn finish_outline(points: &[Point], epsilon: f32) -> Vec<Point> {
    let mut outline = simplify(points, epsilon);
    if let (Some(&first), Some(&last)) = (outline.first(), outline.last()) {
        if first != last {
            outline.push(first);
        }
    }
    outline
}

/// Turns pointer input into closed outlines.
///
/// A freehand stroke runs from [`press`](Self::press) to
/// [`release`](Self::release). Independently, a polygon draft collects
/// clicked vertices until it is submitted.
#[derive(Debug, Clone, Default)]
pub struct StrokeRecorder {
    state: StrokeState,
    draft: Vec<Point>,
    config: StrokeConfig,
}

impl StrokeRecorder {
    pub fn new(config: StrokeConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &StrokeConfig {
        &self.config
    }

    pub fn state(&self) -> &StrokeState {
        &self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, StrokeState::Recording { .. })
    }

    // ------------------------------------------------------------------------
    // Freehand
    // ------------------------------------------------------------------------

    /// Start a stroke at `point`. A stroke already in progress is discarded.
    pub fn press(&mut self, point: Point) {
        if self.is_recording() {
            log::debug!("Discarding unfinished stroke");
        }
        self.state = StrokeState::Recording {
            points: vec![point],
        };
    }

    /// Append a point while recording, repeats included. Ignored when idle.
    pub fn move_to(&mut self, point: Point) {
        if let StrokeState::Recording { points } = &mut self.state {
            points.push(point);
        }
    }

    /// Points of the stroke in progress.
    pub fn current_stroke(&self) -> &[Point] {
        match &self.state {
            StrokeState::Recording { points } => points,
            StrokeState::Idle => &[],
        }
    }

    /// Finish the stroke.
    ///
    /// Returns the closed outline, or `None` when idle or when too few points
    /// were recorded.
    pub fn release(&mut self) -> Option<Vec<Point>> {
        let StrokeState::Recording { points } = std::mem::take(&mut self.state) else {
            return None;
        };
        if points.len() < self.config.min_points {
            log::debug!("Stroke of {} points discarded", points.len());
            return None;
        }
        let outline = finish_outline(&points, self.config.simplify_epsilon);
        log::debug!(
            "Stroke finished: {} points simplified to {}",
            points.len(),
            outline.len()
        );
        Some(outline)
    }

    /// Abandon the stroke in progress.
    pub fn cancel(&mut self) {
        self.state = StrokeState::Idle;
    }

    // ------------------------------------------------------------------------
    // Polygon draft
    // ------------------------------------------------------------------------

    pub fn draft(&self) -> &[Point] {
        &self.draft
    }

    pub fn add_point(&mut self, point: Point) {
        self.draft.push(point);
    }

    /// Remove the last placed point.
    pub fn undo_point(&mut self) -> Option<Point> {
        self.draft.pop()
    }

    pub fn clear_draft(&mut self) {
        self.draft.clear();
    }

    /// Whether the draft's last point repeats its first.
    pub fn is_draft_closed(&self) -> bool {
        self.draft.len() > 1 && self.draft.first() == self.draft.last()
    }

    /// Close the draft when its last point lies near the first.
    ///
    /// Returns true if the closing vertex was added.
    pub fn try_auto_close(&mut self) -> bool {
        if self.draft.len() < self.config.min_points || self.is_draft_closed() {
            return false;
        }
        let (Some(&first), Some(&last)) = (self.draft.first(), self.draft.last()) else {
            return false;
        };
        if last.distance_to(&first) < self.config.auto_close_distance {
            self.draft.push(first);
            return true;
        }
        false
    }

    /// Validate and finish an arbitrary polygon.
    pub fn finish_polygon(&self, points: &[Point]) -> Result<Vec<Point>, EngineError> {
        if points.len() < self.config.min_points {
            return Err(EngineError::TooFewPoints {
                count: points.len(),
                min: self.config.min_points,
            });
        }
        Ok(finish_outline(points, self.config.simplify_epsilon))
    }

    /// Finish the draft, clearing it on success.
    pub fn take_draft(&mut self) -> Result<Vec<Point>, EngineError> {
        let outline = self.finish_polygon(&self.draft)?;
        self.draft.clear();
        Ok(outline)
    }
}
