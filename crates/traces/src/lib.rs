//! Location-trace files and the ground-truth side of an evaluation.
//!
//! A trace is a tab-separated file without header, one observation per line:
//! `user_id_or_DEL, iso_timestamp, latitude, longitude[, ...]`. Original and
//! anonymized files are always read in lockstep, line N of each describing the
//! same original event.

mod row;
mod reader;
mod shape;
mod footprint;
mod shuffle;
mod attack;
mod cancel;

pub use row::{Cell, CellSize, InvalidCellSize, TraceRow, week_key, DELETED_MARKER, SEPARATOR};
pub use reader::{paired_rows, PairedRows, TraceReader};
pub use shape::{validate_shape, ShapeReport, TraceShape};
pub use footprint::{build_footprint, build_footprint_file, Footprint, LinkTable};
pub use shuffle::{shuffle_rows, ShuffleConfig, DEFAULT_CHUNK_ROWS};
pub use attack::{grade_attack, naive_guesses, score_naive_attack};
pub use cancel::{Cancellation, CANCEL_CHECK_ROWS};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("The original file is invalid.")]
    InvalidOriginal,

    #[error("The uploaded file is invalid (incorrect number of columns), line {line}")]
    InvalidColumns { line: usize },

    #[error("The uploaded file is invalid (incorrect number of rows): expected {expected}, found {found}")]
    InvalidRowCount { expected: usize, found: usize },

    #[error("The uploaded file is invalid (incorrect format)")]
    InvalidFormat,

    #[error("An identifier is missing, line {line}")]
    MissingUserId { line: usize },

    #[error("A user has multiple identifiers per week, line {line}")]
    DuplicateUserIdWeek { line: usize },

    #[error("The date is nonexistent or incorrectly formatted, line {line}")]
    InvalidDate { line: usize },

    #[error("Malformed row, line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used when mapping failures to a terminal status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Shape,
    Footprint,
    Row,
    Io,
    Cancelled,
}

impl TraceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TraceError::InvalidOriginal
            | TraceError::InvalidColumns { .. }
            | TraceError::InvalidRowCount { .. }
            | TraceError::InvalidFormat => ErrorKind::Shape,
            TraceError::MissingUserId { .. }
            | TraceError::DuplicateUserIdWeek { .. }
            | TraceError::InvalidDate { .. } => ErrorKind::Footprint,
            TraceError::MalformedRow { .. } => ErrorKind::Row,
            TraceError::Io(_) | TraceError::Json(_) => ErrorKind::Io,
            TraceError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// 1-based line the error points at, when it is row-attributable.
    pub fn line(&self) -> Option<usize> {
        match self {
            TraceError::InvalidColumns { line }
            | TraceError::MissingUserId { line }
            | TraceError::DuplicateUserIdWeek { line }
            | TraceError::InvalidDate { line }
            | TraceError::MalformedRow { line, .. } => Some(*line),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TraceError>;

/// Rejections of a team-submitted attack file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttackFileError {
    #[error("Missing identifier {0}")]
    MissingIdentifier(String),
}
