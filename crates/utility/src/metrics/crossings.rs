use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use traces::{paired_rows, Cancellation, Cell, CellSize};

use crate::metrics::parse_params;
use crate::tally::Tally;
use crate::{Metric, MetricError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossingsParams {
    pub size: CellSize,
    /// Fraction of the most visited original cells to look for.
    pub pt: f64,
}

impl Default for CrossingsParams {
    fn default() -> Self {
        Self {
            size: CellSize::DEFAULT,
            pt: 0.1,
        }
    }
}

/// Checks that the most crowded cells stay the most crowded after
/// anonymization.
pub struct Crossings;

impl Crossings {
    fn params(&self, params: &Value) -> Result<CrossingsParams, MetricError> {
        let p: CrossingsParams = parse_params(self.name(), params)?;
        if !(0.0..=1.0).contains(&p.pt) {
            return Err(MetricError::InvalidParameters {
                metric: self.name().to_string(),
                reason: format!("pt must lie in [0, 1], got {}", p.pt),
            });
        }
        Ok(p)
    }
}

impl Metric for Crossings {
    fn name(&self) -> &'static str {
        "crossings"
    }

    fn validate(&self, params: &Value) -> Result<(), MetricError> {
        self.params(params).map(drop)
    }

    fn score(&self, original: &Path, anonymized: &Path, params: &Value, cancel: &Cancellation) -> Result<f64, MetricError> {
        let name = self.name();
        let p = self.params(params)?;

        let mut original_cells: Tally<Cell> = Tally::new();
        let mut anonymized_cells: Tally<Cell> = Tally::new();

        for pair in paired_rows(original, anonymized, cancel).map_err(|e| MetricError::from_trace(name, e))? {
            let (line, orig, anon) = pair.map_err(|e| MetricError::from_trace(name, e))?;

            let (lat, lon) = orig.position(line).map_err(|e| MetricError::from_trace(name, e))?;
            original_cells.add(p.size.cell(lat, lon), 1);

            if !anon.is_deleted() {
                let (lat, lon) = anon.position(line).map_err(|e| MetricError::from_trace(name, e))?;
                anonymized_cells.add(p.size.cell(lat, lon), 1);
            }
        }

        let to_check = (original_cells.len() as f64 * p.pt).floor() as usize;
        if to_check == 0 {
            // Nothing to compare against: vacuously preserved.
            warn!(cells = original_cells.len(), pt = p.pt, "crossings: no candidate cells, scoring 1.0");
            return Ok(1.0);
        }

        let top_anonymized: HashSet<Cell> = anonymized_cells
            .top(to_check)
            .into_iter()
            .map(|(cell, _)| cell)
            .collect();

        let hits = original_cells
            .top(to_check)
            .iter()
            .filter(|(cell, _)| top_anonymized.contains(cell))
            .count();

        Ok(hits as f64 / to_check as f64)
    }
}
