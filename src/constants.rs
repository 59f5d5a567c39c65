//! Default tuning constants for the annotation engine.
//!
//! Most of these are only defaults: [`crate::config::EngineConfig`] carries the
//! values actually used at runtime.

use std::time::Duration;

/// Minimum width/height of a cell bounding box, in image pixels.
pub const BBOX_EPSILON: f32 = 1.0;

/// Minimum number of recorded points for a freehand stroke to become a cell.
pub const MIN_STROKE_POINTS: usize = 3;

/// Default Ramer-Douglas-Peucker tolerance for freehand strokes (pixels).
pub const DEFAULT_SIMPLIFY_EPSILON: f32 = 2.0;

/// A click-placed polygon closes itself when its last point is this close to
/// the first (pixels).
pub const AUTO_CLOSE_DISTANCE: f32 = 15.0;

/// Similarity results farther than this from every cell centroid stay
/// unmatched (pixels).
pub const MATCH_TOLERANCE: f32 = 20.0;

/// Similarity results this close to an already-displayed auto point are
/// dropped as duplicates (pixels).
pub const DUPLICATE_TOLERANCE: f32 = 15.0;

/// Lower bound on the click snapping radius (pixels).
pub const MIN_SNAP_DISTANCE: f32 = 15.0;

/// Default rendered point radius; the snap radius is at least twice this.
pub const DEFAULT_POINT_SIZE: f32 = 4.0;

/// Zoom factor applied by the zoom in/out buttons.
pub const ZOOM_STEP: f32 = 1.2;

/// Similarity strictness bounds (1 = most lenient, 10 = most strict).
pub const MIN_STRICTNESS: u8 = 1;
pub const MAX_STRICTNESS: u8 = 10;
pub const DEFAULT_STRICTNESS: u8 = 5;

/// Selected cells required before a `user_only` similarity request.
pub const USER_ONLY_MIN_SEEDS: usize = 5;

/// Selected cells required before a `cumulative` similarity request.
pub const CUMULATIVE_MIN_SEEDS: usize = 1;

/// Maximum number of undo entries kept.
pub const UNDO_HISTORY_LIMIT: usize = 100;

/// Score assigned to hand-drawn cells.
pub const MANUAL_CELL_SCORE: f32 = 1.0;

/// Upper bound on a single retry delay, however far the backoff grows.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Largest retry backoff multiplier a config may set.
pub const MAX_BACKOFF_MULTIPLIER: f32 = 10.0;

/// Label prefix used when cells are sent to the similarity service.
pub const SEED_LABEL_PREFIX: &str = "cell_";

/// Catch-all cell type; committing under it needs a specific name instead.
pub const OTHERS_CELL_TYPE: &str = "Others";

/// Default cell-type vocabulary offered to annotators.
pub const DEFAULT_CELL_TYPES: &[&str] = &[
    "WBC - Lymphocyte",
    "WBC - Others",
    "RBC",
    "Bronchoepithelial cell",
    "Atypical cell",
    "Granuloma",
    "Artifacts",
    OTHERS_CELL_TYPE,
];
