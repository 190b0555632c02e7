use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{paired_rows, Cancellation, Result, TraceError};

/// `{user_id: {"YYYY-Www": [anonymized_id, ...]}}`
pub type LinkTable = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Ground-truth linkage between original and anonymized identifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Footprint(LinkTable);

impl Footprint {
    pub fn from_table(table: LinkTable) -> Self {
        Self(table)
    }

    pub fn table(&self) -> &LinkTable {
        &self.0
    }

    pub fn true_id(&self, user_id: &str, week: &str) -> Option<&str> {
        self.0.get(user_id)?.get(week)?.first().map(String::as_str)
    }

    /// Total number of (user, week) entries.
    pub fn entry_count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut w, self)?;
        w.flush()?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let r = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(r)?)
    }

    fn link(&mut self, user_id: &str, week: String, anon_id: &str, line: usize) -> Result<()> {
        let weeks = self.0.entry(user_id.to_string()).or_default();
        match weeks.get(&week) {
            None => {
                weeks.insert(week, vec![anon_id.to_string()]);
                Ok(())
            }
            Some(ids) if ids.first().map(String::as_str) == Some(anon_id) => Ok(()),
            Some(_) => Err(TraceError::DuplicateUserIdWeek { line }),
        }
    }
}

/// Builds the linkage table from an original/anonymized pair. An individual
/// must keep its ISO week and map to a single anonymized id per week.
pub fn build_footprint(original: &Path, anonymized: &Path, cancel: &Cancellation) -> Result<Footprint> {
    let mut footprint = Footprint::default();

    for pair in paired_rows(original, anonymized, cancel)? {
        let (line, orig, anon) = pair?;

        if anon.user_id().is_empty() {
            return Err(TraceError::MissingUserId { line });
        }
        if anon.is_deleted() {
            continue;
        }

        let anon_week = anon.week(line)?;
        let orig_week = orig.week(line)?;
        if orig_week != anon_week {
            return Err(TraceError::DuplicateUserIdWeek { line });
        }

        footprint.link(orig.user_id(), orig_week, anon.user_id(), line)?;
    }

    debug!(users = footprint.0.len(), entries = footprint.entry_count(), "footprint built");
    Ok(footprint)
}

/// [`build_footprint`] followed by persisting the artifact. The file is
/// removed again when `cancel` was set while it was being written.
pub fn build_footprint_file(original: &Path, anonymized: &Path, out: &Path, cancel: &Cancellation) -> Result<Footprint> {
    let footprint = build_footprint(original, anonymized, cancel)?;
    footprint.write_to(out)?;
    if cancel.is_cancelled() {
        let _ = std::fs::remove_file(out);
        return Err(TraceError::Cancelled);
    }
    Ok(footprint)
}
