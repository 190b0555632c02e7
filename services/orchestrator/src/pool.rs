use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::error;

use crate::error::EvaluationError;

/// Bounded pool for blocking evaluation stages. A permit is held for the
/// whole blocking call, including when the awaiting future is dropped.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idle_workers(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn run_blocking<R, F>(&self, task: &'static str, f: F) -> Result<R, EvaluationError>
    where
        R: Send + 'static,
        F: FnOnce() -> Result<R, EvaluationError> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| EvaluationError::unknown(task, e))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|e| {
            error!(task, error = %e, "worker task did not complete");
            EvaluationError::unknown(task, e)
        })?
    }
}
