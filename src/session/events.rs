//! Change notifications queued by the session for a renderer to drain.

use ebat_geometry::{Size, Viewport};

use crate::model::{BatchId, CellIndex, RecordId, SlideId};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A slide was loaded and its cells ingested
    SlideLoaded { slide: SlideId, cells: usize },
    /// The slide image dimensions became known
    ImageReady(Size),
    /// Zoom or pan changed, or the container was resized
    ViewportChanged(Viewport),
    /// Any of the selection sets or the overlay changed
    SelectionChanged,
    /// A hand-drawn cell was added to the registry
    CellAdded { index: CellIndex },
    /// A selection was saved as an annotation record
    Committed { record: RecordId, cells: usize },
    /// A committed cell was returned to unselected
    AnnotationRemoved { index: CellIndex },
    /// A similarity request was issued
    DetectionStarted { batch: BatchId },
    /// A similarity response was folded into the selection
    DetectionFinished { batch: BatchId, selected: usize },
    /// The similarity service failed; nothing was changed
    DetectionFailed { batch: BatchId, message: String },
    /// A response for an earlier slide or a cancelled request was dropped
    StaleResponseDiscarded { batch: BatchId },
    /// Committed annotations were handed to the commit sink
    Submitted { rows: usize },
    /// The slide was reported to the commit sink as poor quality
    QualityRejected { slide: SlideId },
}
