//! Utility scoring of anonymized traces.
//!
//! Metrics are stateless: every call receives its own typed parameters, so
//! any number of them may run in parallel against the same file pair.

pub mod metrics;
mod tally;
mod aggregation;
mod catalog;

pub use metrics::{HourGap, Metric, MetricRegistry, Movement, PoiRetention, Crossings};
pub use aggregation::{aggregate, AggregationMethod};
pub use catalog::{AggregationDescriptor, Catalog, CatalogError, EvaluationPlan, MetricDescriptor, PlannedMetric};

use thiserror::Error;
use traces::TraceError;

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("Error in utility calculation ({metric}), line {line}: {reason}")]
    Row {
        metric: String,
        line: usize,
        reason: String,
    },

    #[error("Invalid parameters for {metric}: {reason}")]
    InvalidParameters { metric: String, reason: String },

    #[error("Unknown metric {0}")]
    UnknownMetric(String),

    #[error("Error in script {metric}: {reason}")]
    Io { metric: String, reason: String },
}

impl MetricError {
    pub fn row(metric: &str, line: usize, reason: impl Into<String>) -> Self {
        MetricError::Row {
            metric: metric.to_string(),
            line,
            reason: reason.into(),
        }
    }

    /// Attributes a trace failure to `metric`, keeping its line when known.
    pub fn from_trace(metric: &str, err: TraceError) -> Self {
        match err.line() {
            Some(line) => MetricError::row(metric, line, err.to_string()),
            None => MetricError::Io {
                metric: metric.to_string(),
                reason: err.to_string(),
            },
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            MetricError::Row { line, .. } => Some(*line),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("No working utility script found")]
    NoWorkingMetric,
}
