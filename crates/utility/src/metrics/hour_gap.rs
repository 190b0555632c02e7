use std::path::Path;

use serde_json::Value;
use traces::{paired_rows, Cancellation};

use crate::{Metric, MetricError};

/// Deduction applied for an hour gap of `index` between the anonymized and
/// the original timestamp. A gap of 0 is never looked up.
pub const HOUR_PENALTY: [f64; 24] = [
    1.0, 0.9, 0.8, 0.6, 0.4, 0.2, 0.0, 0.1, 0.2, 0.3, 0.4, 0.5,
    0.6, 0.5, 0.4, 0.3, 0.2, 0.1, 0.0, 0.2, 0.4, 0.6, 0.8, 0.9,
];

/// Checks that each record keeps its hour of day. Moving a record to another
/// day is not penalized.
pub struct HourGap;

impl HourGap {
    pub fn row_score(hour_original: u32, hour_anonymized: u32) -> f64 {
        let gap = hour_original.abs_diff(hour_anonymized) as usize;
        if gap == 0 {
            return 1.0;
        }
        (1.0 - HOUR_PENALTY[gap]).max(0.0)
    }
}

impl Metric for HourGap {
    fn name(&self) -> &'static str {
        "hour_gap"
    }

    fn validate(&self, _params: &Value) -> Result<(), MetricError> {
        Ok(())
    }

    fn score(&self, original: &Path, anonymized: &Path, _params: &Value, cancel: &Cancellation) -> Result<f64, MetricError> {
        let name = self.name();
        let mut total = 0.0;
        let mut rows = 0usize;

        for pair in paired_rows(original, anonymized, cancel).map_err(|e| MetricError::from_trace(name, e))? {
            let (line, orig, anon) = pair.map_err(|e| MetricError::from_trace(name, e))?;
            rows += 1;

            if anon.is_deleted() {
                total += 1.0;
                continue;
            }
            if anon.timestamp().len() <= 13 || anon.user_id().is_empty() {
                return Err(MetricError::row(name, line, "invalid timestamp format"));
            }

            let (Some(h_anon), Some(h_orig)) = (anon.raw_hour(), orig.raw_hour()) else {
                return Err(MetricError::row(name, line, "unreadable hour"));
            };
            if h_anon >= 24 || h_orig >= 24 {
                return Err(MetricError::row(name, line, "hour outside 0-23"));
            }

            total += Self::row_score(h_orig, h_anon);
        }

        Ok(if rows > 0 { total / rows as f64 } else { 0.0 })
    }
}
