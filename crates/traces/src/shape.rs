use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::{Cancellation, Result, TraceError, TraceRow, SEPARATOR};

/// `(row_count, column_count)` of a reference trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceShape {
    pub rows: usize,
    pub columns: usize,
}

impl TraceShape {
    /// Column count comes from the first line only.
    pub fn of_reference(path: &Path) -> Result<Self> {
        let f = File::open(path).map_err(|_| TraceError::InvalidOriginal)?;
        let mut rows = 0usize;
        let mut columns = None;
        for line in BufReader::new(f).lines() {
            let line = line.map_err(|_| TraceError::InvalidOriginal)?;
            if columns.is_none() {
                columns = Some(line.matches(SEPARATOR).count() + 1);
            }
            rows += 1;
        }
        let columns = columns.ok_or(TraceError::InvalidOriginal)?;
        Ok(Self { rows, columns })
    }
}

#[derive(Clone, Debug)]
pub struct ShapeReport {
    pub shape: TraceShape,
    /// BLAKE3 over every line of the candidate, newline-terminated.
    pub fingerprint: [u8; 32],
}

impl ShapeReport {
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint)
    }
}

/// Checks a candidate file against the reference shape. `DEL` rows are exempt
/// from the column check but still count as rows.
pub fn validate_shape(candidate: &Path, reference: &Path, cancel: &Cancellation) -> Result<ShapeReport> {
    let shape = TraceShape::of_reference(reference)?;

    let f = File::open(candidate).map_err(|_| TraceError::InvalidFormat)?;
    let mut hasher = blake3::Hasher::new();
    let mut rows = 0usize;

    for line in BufReader::new(f).lines() {
        let line = line.map_err(|_| TraceError::InvalidFormat)?;
        rows += 1;
        cancel.check_row(rows)?;

        hasher.update(line.as_bytes());
        hasher.update(b"\n");

        let row = TraceRow::parse(&line);
        if !row.is_deleted() && row.column_count() != shape.columns {
            return Err(TraceError::InvalidColumns { line: rows });
        }
    }

    if rows != shape.rows {
        return Err(TraceError::InvalidRowCount {
            expected: shape.rows,
            found: rows,
        });
    }

    Ok(ShapeReport {
        shape,
        fingerprint: hasher.finalize().into(),
    })
}
