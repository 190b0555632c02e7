use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use traces::{paired_rows, Cancellation, Cell, CellSize};

use crate::metrics::parse_params;
use crate::{Metric, MetricError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementParams {
    pub size: CellSize,
}

/// Compares, per individual, how many distinct cells were visited.
pub struct Movement;

impl Metric for Movement {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn validate(&self, params: &Value) -> Result<(), MetricError> {
        parse_params::<MovementParams>(self.name(), params).map(drop)
    }

    fn score(&self, original: &Path, anonymized: &Path, params: &Value, cancel: &Cancellation) -> Result<f64, MetricError> {
        let name = self.name();
        let p: MovementParams = parse_params(name, params)?;

        let mut original_cells: HashMap<String, HashSet<Cell>> = HashMap::new();
        let mut anonymized_cells: HashMap<String, HashSet<Cell>> = HashMap::new();

        for pair in paired_rows(original, anonymized, cancel).map_err(|e| MetricError::from_trace(name, e))? {
            let (line, orig, anon) = pair.map_err(|e| MetricError::from_trace(name, e))?;

            let (lat, lon) = orig.position(line).map_err(|e| MetricError::from_trace(name, e))?;
            original_cells
                .entry(orig.user_id().to_string())
                .or_default()
                .insert(p.size.cell(lat, lon));

            if !anon.is_deleted() {
                let (lat, lon) = anon.position(line).map_err(|e| MetricError::from_trace(name, e))?;
                anonymized_cells
                    .entry(orig.user_id().to_string())
                    .or_default()
                    .insert(p.size.cell(lat, lon));
            }
        }

        if original_cells.is_empty() {
            return Ok(0.0);
        }

        let total: f64 = original_cells
            .iter()
            .map(|(user, cells)| {
                let o = cells.len();
                let a = anonymized_cells.get(user).map_or(0, HashSet::len);
                ratio(o, a)
            })
            .sum();

        Ok(total / original_cells.len() as f64)
    }
}

fn ratio(a: usize, b: usize) -> f64 {
    match a.max(b) {
        0 => 0.0,
        m => a.min(b) as f64 / m as f64,
    }
}
