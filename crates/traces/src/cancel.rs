use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{Result, TraceError};

/// Readers look at the flag once every this many rows.
pub const CANCEL_CHECK_ROWS: usize = 1024;

/// Stop flag shared by every pass of one evaluation. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TraceError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Checks on the first row and then every [`CANCEL_CHECK_ROWS`] rows.
    pub fn check_row(&self, line: usize) -> Result<()> {
        if line % CANCEL_CHECK_ROWS == 1 {
            self.check()
        } else {
            Ok(())
        }
    }
}
