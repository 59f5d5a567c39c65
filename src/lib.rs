//! EBAT - EBUS-TBNA Annotation Engine
//!
//! The geometry and state core of a cell-annotation workbench for cytology
//! slides. Detected cells are loaded from CSV, picked by click, freehand
//! stroke, or similarity detection, and committed under a cell type. The
//! engine is UI-agnostic: it keeps state and emits [`SessionEvent`]s, and
//! never draws.

pub mod config;
pub mod constants;
pub mod data;
pub mod detection;
pub mod error;
pub mod model;
pub mod registry;
pub mod selection;
pub mod session;
pub mod stroke;
pub mod undo;

pub use config::{ConfigError, EngineConfig};
pub use detection::{
    CommitRow, CommitSink, DetectionSource, RetryPolicy, SimilarityDetector, SimilarityMode,
    SimilarityQuery, SimilarityResult, Submission,
};
pub use error::{CollaboratorError, DataError, EngineError};
pub use registry::CellRegistry;
pub use selection::{SelectionState, ToggleOutcome};
pub use session::{AnnotationSession, SessionEvent, SimilarityCompletion, SimilarityTicket};

pub use ebat_geometry::{BoundingBox, Point, Size, Viewport};
