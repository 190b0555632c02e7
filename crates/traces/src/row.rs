use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Result, TraceError};

pub const SEPARATOR: char = '\t';

/// First-column marker of a suppressed record in an anonymized file.
pub const DELETED_MARKER: &str = "DEL";

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// One line of a trace file, split on the separator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceRow {
    fields: Vec<String>,
}

impl TraceRow {
    pub fn parse(line: &str) -> Self {
        let line = line.strip_suffix('\r').unwrap_or(line);
        Self {
            fields: line.split(SEPARATOR).map(str::to_string).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn column_count(&self) -> usize {
        self.fields.len()
    }

    pub fn user_id(&self) -> &str {
        self.field(0)
    }

    pub fn is_deleted(&self) -> bool {
        self.user_id() == DELETED_MARKER
    }

    pub fn timestamp(&self) -> &str {
        self.field(1)
    }

    /// Hour of day as written in the timestamp (chars 11..13), unchecked.
    pub fn raw_hour(&self) -> Option<u32> {
        self.timestamp().get(11..13)?.parse().ok()
    }

    pub fn datetime(&self, line: usize) -> Result<NaiveDateTime> {
        let ts = self.timestamp();
        let ts = ts.get(..19).unwrap_or(ts);
        if ts.len() == 10 {
            return Ok(self.date(line)?.and_time(chrono::NaiveTime::MIN));
        }
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(ts, fmt).ok())
            .ok_or(TraceError::InvalidDate { line })
    }

    pub fn date(&self, line: usize) -> Result<NaiveDate> {
        self.timestamp()
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .ok_or(TraceError::InvalidDate { line })
    }

    /// ISO week bucket of the row, formatted `YYYY-Www`.
    pub fn week(&self, line: usize) -> Result<String> {
        Ok(week_key(self.date(line)?))
    }

    /// Latitude/longitude at their canonical positions (columns 3 and 4).
    pub fn position(&self, line: usize) -> Result<(f64, f64)> {
        Ok((self.coordinate(2, line)?, self.coordinate(3, line)?))
    }

    /// Latitude/longitude read from the last two columns.
    pub fn trailing_position(&self, line: usize) -> Result<(f64, f64)> {
        let n = self.fields.len();
        if n < 2 {
            return Err(TraceError::MalformedRow {
                line,
                reason: "missing coordinates".into(),
            });
        }
        Ok((self.coordinate(n - 2, line)?, self.coordinate(n - 1, line)?))
    }

    fn coordinate(&self, idx: usize, line: usize) -> Result<f64> {
        let raw = self.fields.get(idx).ok_or_else(|| TraceError::MalformedRow {
            line,
            reason: format!("missing column {}", idx + 1),
        })?;
        raw.trim().parse().map_err(|_| TraceError::MalformedRow {
            line,
            reason: format!("invalid coordinate {raw:?}"),
        })
    }

    fn field(&self, idx: usize) -> &str {
        self.fields.get(idx).map(String::as_str).unwrap_or("")
    }
}

pub fn week_key(date: NaiveDate) -> String {
    let w = date.iso_week();
    format!("{}-W{:02}", w.year(), w.week())
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cell size {0} outside -1..=4")]
pub struct InvalidCellSize(pub i32);

/// Rounding precision of a cell, from country level (-1) to meter level (4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct CellSize(i32);

impl CellSize {
    pub const DEFAULT: CellSize = CellSize(2);

    pub fn new(digits: i32) -> std::result::Result<Self, InvalidCellSize> {
        if (-1..=4).contains(&digits) {
            Ok(Self(digits))
        } else {
            Err(InvalidCellSize(digits))
        }
    }

    pub fn digits(self) -> i32 {
        self.0
    }

    pub fn cell(self, lat: f64, lon: f64) -> Cell {
        let scale = 10f64.powi(self.0);
        Cell {
            lat: (lat * scale).round_ties_even() as i64,
            lon: (lon * scale).round_ties_even() as i64,
        }
    }
}

impl Default for CellSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i32> for CellSize {
    type Error = InvalidCellSize;

    fn try_from(v: i32) -> std::result::Result<Self, Self::Error> {
        Self::new(v)
    }
}

impl From<CellSize> for i32 {
    fn from(s: CellSize) -> i32 {
        s.0
    }
}

/// A coordinate pair rounded to a [`CellSize`], stored as scaled integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub lat: i64,
    pub lon: i64,
}
