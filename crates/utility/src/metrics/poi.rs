use std::collections::HashMap;
use std::path::Path;

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use traces::{paired_rows, Cancellation, Cell, CellSize, TraceRow};

use crate::metrics::parse_params;
use crate::tally::Tally;
use crate::{Metric, MetricError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoiParams {
    pub size: CellSize,
    /// Top cells retained per individual-week and category.
    #[serde(alias = "num_POIs")]
    pub num_pois: usize,
    pub night_start: u32,
    pub night_end: u32,
    pub work_start: u32,
    pub work_end: u32,
}

impl Default for PoiParams {
    fn default() -> Self {
        Self {
            size: CellSize::DEFAULT,
            num_pois: 1,
            night_start: 22,
            night_end: 6,
            work_start: 9,
            work_end: 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Category {
    Night,
    Work,
}

/// (user id, ISO year, ISO week) of the original row.
type WeekKey = (String, i32, u32);

impl PoiParams {
    fn category(&self, ts: NaiveDateTime) -> Option<Category> {
        if ts.weekday().num_days_from_monday() >= 5 {
            return None;
        }
        let t = ts.time();
        let night_start = NaiveTime::from_hms_opt(self.night_start, 0, 0)?;
        let night_end = NaiveTime::from_hms_opt(self.night_end, 0, 0)?;
        if t > night_start || t < night_end {
            Some(Category::Night)
        } else if (self.work_start..self.work_end).contains(&t.hour()) {
            Some(Category::Work)
        } else {
            None
        }
    }
}

/// Time spent per cell and category for every individual-week of one file.
#[derive(Default)]
struct Stays {
    cells: HashMap<WeekKey, HashMap<Category, Tally<Cell>>>,
    last_seen: HashMap<WeekKey, NaiveDateTime>,
}

impl Stays {
    /// Duration since the previous categorized observation of `key`; the first
    /// one contributes nothing.
    fn record(&mut self, key: &WeekKey, category: Category, cell: Cell, ts: NaiveDateTime) {
        let elapsed = match self.last_seen.insert(key.clone(), ts) {
            Some(prev) => (ts - prev).num_seconds(),
            None => 0,
        };
        self.cells
            .entry(key.clone())
            .or_default()
            .entry(category)
            .or_default()
            .add(cell, elapsed);
    }
}

/// Checks that the places where an individual spends its nights and working
/// hours survive anonymization.
pub struct PoiRetention;

impl PoiRetention {
    fn params(&self, params: &Value) -> Result<PoiParams, MetricError> {
        let p: PoiParams = parse_params(self.name(), params)?;
        let hours = [p.night_start, p.night_end, p.work_start, p.work_end];
        if hours.iter().any(|h| *h > 23) {
            return Err(MetricError::InvalidParameters {
                metric: self.name().to_string(),
                reason: "hours must lie in 0..=23".into(),
            });
        }
        Ok(p)
    }

    fn observe(
        &self,
        p: &PoiParams,
        stays: &mut Stays,
        key: &WeekKey,
        row: &TraceRow,
        line: usize,
    ) -> Result<(), MetricError> {
        let name = self.name();
        let ts = row.datetime(line).map_err(|e| MetricError::from_trace(name, e))?;
        if let Some(category) = p.category(ts) {
            let (lat, lon) = row.position(line).map_err(|e| MetricError::from_trace(name, e))?;
            stays.record(key, category, p.size.cell(lat, lon), ts);
        }
        Ok(())
    }
}

impl Metric for PoiRetention {
    fn name(&self) -> &'static str {
        "poi_retention"
    }

    fn validate(&self, params: &Value) -> Result<(), MetricError> {
        self.params(params).map(drop)
    }

    fn score(&self, original: &Path, anonymized: &Path, params: &Value, cancel: &Cancellation) -> Result<f64, MetricError> {
        let name = self.name();
        let p = self.params(params)?;

        let mut original_stays = Stays::default();
        let mut anonymized_stays = Stays::default();

        for pair in paired_rows(original, anonymized, cancel).map_err(|e| MetricError::from_trace(name, e))? {
            let (line, orig, anon) = pair.map_err(|e| MetricError::from_trace(name, e))?;

            let ts = orig.datetime(line).map_err(|e| MetricError::from_trace(name, e))?;
            let week = ts.date().iso_week();
            let key: WeekKey = (orig.user_id().to_string(), week.year(), week.week());

            self.observe(&p, &mut original_stays, &key, &orig, line)?;
            if !anon.is_deleted() {
                self.observe(&p, &mut anonymized_stays, &key, &anon, line)?;
            }
        }

        let mut total = 0.0;
        let mut counted = 0usize;

        for (key, categories) in &original_stays.cells {
            for (category, tally) in categories {
                let anon_top: HashMap<Cell, i64> = anonymized_stays
                    .cells
                    .get(key)
                    .and_then(|c| c.get(category))
                    .map(|t| t.top(p.num_pois).into_iter().collect())
                    .unwrap_or_default();

                for (cell, orig_secs) in tally.top(p.num_pois) {
                    let anon_secs = anon_top.get(&cell).copied().unwrap_or(0);
                    let hi = orig_secs.max(anon_secs);
                    if hi <= 0 {
                        continue;
                    }
                    let lo = orig_secs.min(anon_secs).max(0);
                    total += lo as f64 / hi as f64;
                    counted += 1;
                }
            }
        }

        Ok(if counted > 0 { total / counted as f64 } else { 0.0 })
    }
}
