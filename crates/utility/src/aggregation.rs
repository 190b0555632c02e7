use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::AggregationError;

/// Reducer turning the enabled metric scores into one utility value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    #[default]
    Mean,
    Median,
    Min,
    Max,
}

impl AggregationMethod {
    pub const ALL: [AggregationMethod; 4] = [
        AggregationMethod::Min,
        AggregationMethod::Max,
        AggregationMethod::Mean,
        AggregationMethod::Median,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AggregationMethod::Mean => "mean",
            AggregationMethod::Median => "median",
            AggregationMethod::Min => "min",
            AggregationMethod::Max => "max",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Like [`parse`](Self::parse) but unknown names fall back to `mean`.
    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            warn!(aggregation = name, "unknown aggregation, using mean");
            AggregationMethod::Mean
        })
    }
}

pub fn aggregate(scores: &[f64], method: AggregationMethod) -> Result<f64, AggregationError> {
    if scores.is_empty() {
        return Err(AggregationError::NoWorkingMetric);
    }

    Ok(match method {
        AggregationMethod::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
        AggregationMethod::Median => {
            let mut sorted = scores.to_vec();
            sorted.sort_by(f64::total_cmp);
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            } else {
                sorted[mid]
            }
        }
        AggregationMethod::Min => scores.iter().copied().fold(f64::INFINITY, f64::min),
        AggregationMethod::Max => scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}
