use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::{Cancellation, Result, TraceRow};

/// Streams the rows of one trace file with their 1-based line numbers.
pub struct TraceReader {
    lines: Lines<BufReader<File>>,
    line: usize,
    cancel: Option<Cancellation>,
}

impl TraceReader {
    pub fn open(path: &Path) -> Result<Self> {
        let f = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(f).lines(),
            line: 0,
            cancel: None,
        })
    }

    /// Yields [`TraceError::Cancelled`](crate::TraceError::Cancelled) once
    /// `cancel` is set.
    pub fn watched(mut self, cancel: &Cancellation) -> Self {
        self.cancel = Some(cancel.clone());
        self
    }
}

impl Iterator for TraceReader {
    type Item = Result<(usize, TraceRow)>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.lines.next()?;
        self.line += 1;
        if let Some(Err(e)) = self.cancel.as_ref().map(|c| c.check_row(self.line)) {
            return Some(Err(e));
        }
        Some(raw.map(|l| (self.line, TraceRow::parse(&l))).map_err(Into::into))
    }
}

/// Original and anonymized rows read in lockstep; stops at the shorter file.
pub struct PairedRows {
    original: TraceReader,
    anonymized: TraceReader,
}

pub fn paired_rows(original: &Path, anonymized: &Path, cancel: &Cancellation) -> Result<PairedRows> {
    Ok(PairedRows {
        original: TraceReader::open(original)?.watched(cancel),
        anonymized: TraceReader::open(anonymized)?,
    })
}

impl Iterator for PairedRows {
    type Item = Result<(usize, TraceRow, TraceRow)>;

    fn next(&mut self) -> Option<Self::Item> {
        let orig = self.original.next()?;
        let anon = self.anonymized.next()?;
        Some(match (orig, anon) {
            (Ok((line, o)), Ok((_, a))) => Ok((line, o, a)),
            (Err(e), _) | (_, Err(e)) => Err(e),
        })
    }
}
