//! Error types for the annotation engine.
//!
//! None of these are fatal: every rejected operation leaves the session in
//! the state it was in before the call.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::{CellIndex, RecordId};

/// A rejected engine operation, carrying a reason suitable for user feedback.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The cell has already been committed with a cell type
    #[error("Cell {index} has already been annotated and cannot be selected again")]
    AlreadyCommitted {
        /// The committed cell
        index: CellIndex,
    },

    /// No cell with this index exists on the current slide
    #[error("Unknown cell index {index}")]
    UnknownCell {
        /// The requested index
        index: CellIndex,
    },

    /// A commit named a cell that is not currently selected
    #[error("Cell {index} is not part of the current selection")]
    NotSelected {
        /// The offending index
        index: CellIndex,
    },

    /// Removal requested for a cell that is not annotated
    #[error("Cell {index} is not annotated")]
    NotCommitted {
        /// The offending index
        index: CellIndex,
    },

    /// No annotation record with this id exists
    #[error("Unknown annotation record {id}")]
    UnknownRecord {
        /// The requested record id
        id: RecordId,
    },

    /// Commit requested with nothing selected
    #[error("No cells selected to annotate")]
    EmptySelection,

    /// Commit requested without a cell type
    #[error("Please select a cell type")]
    BlankCellType,

    /// Commit requested under the catch-all type without naming it
    #[error("Please specify the cell type")]
    UnspecifiedCellType,

    /// A drawn polygon has too few points to form a cell
    #[error("Draw a valid polygon (minimum {min} points, got {count})")]
    TooFewPoints {
        /// Points supplied
        count: usize,
        /// Points required
        min: usize,
    },

    /// Pointer input arrived before the slide image dimensions are known
    #[error("Image dimensions are not known yet")]
    ImageNotReady,

    /// No slide has been loaded
    #[error("No slide loaded")]
    NoSlide,

    /// A similarity request for this slide is still running
    #[error("A similarity detection request is already in progress")]
    DetectionInFlight,

    /// Not enough seeds for the requested similarity mode
    #[error("Please select at least {required} cells before using dynamic cell detection (have {found})")]
    NotEnoughSeeds {
        /// Seeds needed for the mode
        required: usize,
        /// Seeds currently selected
        found: usize,
    },

    /// Strictness outside 1..=10
    #[error("Strictness {value} is outside {min}..={max}")]
    StrictnessOutOfRange {
        /// Requested strictness
        value: u8,
        /// Lowest accepted strictness
        min: u8,
        /// Highest accepted strictness
        max: u8,
    },

    /// Final submission requested with no committed annotations
    #[error("No cell annotations to submit")]
    NothingToSubmit,

    /// The external detection/commit collaborator failed
    #[error("Collaborator failed: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// Reading or writing a data file failed
    #[error("Data error: {0}")]
    Data(#[from] DataError),
}

/// Failure reported by an external collaborator (detection source,
/// similarity service, commit sink).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The request timed out
    #[error("Request timed out")]
    Timeout,

    /// The service answered with a non-success status
    #[error("Service returned status {code}: {message}")]
    Status {
        /// HTTP-like status code
        code: u16,
        /// Body or reason text
        message: String,
    },

    /// The response could not be decoded
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl CollaboratorError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Create a malformed-response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Whether repeating the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CollaboratorError::Network(_) | CollaboratorError::Timeout => true,
            CollaboratorError::Status { code, .. } => *code >= 500 || *code == 429,
            CollaboratorError::Malformed(_) => false,
        }
    }
}

/// Errors from the CSV codecs and image header probing.
#[derive(Error, Debug)]
pub enum DataError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing failed as a whole (row-level defects are
    /// dropped, not reported here)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The slide image header could not be read
    #[error("Image error for {path:?}: {source}")]
    Image {
        /// Image file path
        path: PathBuf,
        /// Underlying decoder error
        source: image::ImageError,
    },

    /// Encoded CSV was not valid UTF-8
    #[error("Invalid UTF-8 in CSV output")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl From<csv::IntoInnerError<csv::Writer<Vec<u8>>>> for DataError {
    fn from(err: csv::IntoInnerError<csv::Writer<Vec<u8>>>) -> Self {
        DataError::Io(err.into_error())
    }
}
