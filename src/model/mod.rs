//! Data model for the annotation engine.

mod cell;
mod overlay;
mod record;
mod slide;

pub use cell::{Cell, CellIndex, CellSource};
pub use overlay::{BatchId, Candidate, DisplayPoint, PointSource};
pub use record::{AnnotationRecord, RecordId, TypeCounts};
pub use slide::SlideId;
