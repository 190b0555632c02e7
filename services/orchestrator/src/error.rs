use std::time::Duration;

use thiserror::Error;
use traces::{ErrorKind, TraceError};
use utility::{AggregationError, MetricError};

/// Every way an evaluation can fail. The `Display` text is what ends up in
/// `failed(reason)`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("{0}")]
    Shape(String),

    #[error("{0}")]
    Metric(String),

    #[error("{0}")]
    Footprint(String),

    #[error("{0}")]
    Aggregation(String),

    #[error("Evaluation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unknown error in {task}: {reason}")]
    Unknown { task: String, reason: String },
}

impl EvaluationError {
    pub fn unknown(task: &str, reason: impl ToString) -> Self {
        EvaluationError::Unknown {
            task: task.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Maps a trace failure raised by `task`. Only shape and footprint rule
    /// violations keep their own kind; everything else stays attributed to
    /// the task.
    pub fn from_trace(task: &str, err: TraceError) -> Self {
        match err.kind() {
            ErrorKind::Shape => EvaluationError::Shape(err.to_string()),
            ErrorKind::Footprint => EvaluationError::Footprint(err.to_string()),
            ErrorKind::Row | ErrorKind::Io | ErrorKind::Cancelled => EvaluationError::unknown(task, err),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EvaluationError::Shape(_) => "shape",
            EvaluationError::Metric(_) => "metric",
            EvaluationError::Footprint(_) => "footprint",
            EvaluationError::Aggregation(_) => "aggregation",
            EvaluationError::Timeout(_) => "timeout",
            EvaluationError::Unknown { .. } => "unknown",
        }
    }
}

impl From<MetricError> for EvaluationError {
    fn from(e: MetricError) -> Self {
        EvaluationError::Metric(e.to_string())
    }
}

impl From<AggregationError> for EvaluationError {
    fn from(e: AggregationError) -> Self {
        EvaluationError::Aggregation(e.to_string())
    }
}
