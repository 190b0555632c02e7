//! One submission's evaluation as an explicit task graph:
//!
//! ```text
//! shape ──┬── metric* ── aggregate ─────────────┐
//!         └── (footprint ∥ shuffle) ── attack ───┴── outcome
//! ```
//!
//! Every stage is blocking and runs on the [`WorkerPool`]. All stages of a
//! run share one [`Cancellation`]; a failure or timeout sets it so blocking
//! work still in flight stops and hands its worker back.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use traces::{Cancellation, Footprint, ShapeReport, ShuffleConfig};
use utility::{aggregate, EvaluationPlan, MetricRegistry};

use crate::error::EvaluationError;
use crate::pool::WorkerPool;
use crate::types::{EvaluationOutcome, EvaluationRequest};

/// The blocking work behind each node of the graph. Implementations should
/// return promptly once `cancel` is set.
pub trait EvaluationStages: Send + Sync + 'static {
    fn validate_shape(&self, input: &Path, original: &Path, cancel: &Cancellation) -> Result<ShapeReport, EvaluationError>;

    /// `metric` is the registry name, not the catalog entry name.
    fn run_metric(
        &self,
        metric: &str,
        original: &Path,
        anonymized: &Path,
        params: &Value,
        cancel: &Cancellation,
    ) -> Result<f64, EvaluationError>;

    fn build_footprint(
        &self,
        original: &Path,
        anonymized: &Path,
        out: &Path,
        cancel: &Cancellation,
    ) -> Result<Footprint, EvaluationError>;

    /// Returns the number of rows written.
    fn shuffle(&self, input: &Path, reference_rows: usize, out: &Path, cancel: &Cancellation) -> Result<usize, EvaluationError>;

    fn naive_attack(
        &self,
        original: &Path,
        shuffled: &Path,
        footprint: &Footprint,
        cancel: &Cancellation,
    ) -> Result<f64, EvaluationError>;
}

/// Stages backed by the trace and utility crates.
#[derive(Clone)]
pub struct TraceStages {
    pub registry: MetricRegistry,
    pub shuffle: ShuffleConfig,
}

impl EvaluationStages for TraceStages {
    fn validate_shape(&self, input: &Path, original: &Path, cancel: &Cancellation) -> Result<ShapeReport, EvaluationError> {
        traces::validate_shape(input, original, cancel).map_err(|e| EvaluationError::from_trace("shape", e))
    }

    fn run_metric(
        &self,
        metric: &str,
        original: &Path,
        anonymized: &Path,
        params: &Value,
        cancel: &Cancellation,
    ) -> Result<f64, EvaluationError> {
        Ok(self.registry.run(metric, original, anonymized, params, cancel)?)
    }

    fn build_footprint(
        &self,
        original: &Path,
        anonymized: &Path,
        out: &Path,
        cancel: &Cancellation,
    ) -> Result<Footprint, EvaluationError> {
        traces::build_footprint_file(original, anonymized, out, cancel)
            .map_err(|e| EvaluationError::from_trace("footprint", e))
    }

    fn shuffle(&self, input: &Path, reference_rows: usize, out: &Path, cancel: &Cancellation) -> Result<usize, EvaluationError> {
        traces::shuffle_rows(input, reference_rows, out, &self.shuffle, cancel)
            .map_err(|e| EvaluationError::from_trace("shuffle", e))
    }

    fn naive_attack(
        &self,
        original: &Path,
        shuffled: &Path,
        footprint: &Footprint,
        cancel: &Cancellation,
    ) -> Result<f64, EvaluationError> {
        traces::score_naive_attack(original, shuffled, footprint, cancel)
            .map_err(|e| EvaluationError::from_trace("naive_attack", e))
    }
}

#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<dyn EvaluationStages>,
    pool: WorkerPool,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(stages: Arc<dyn EvaluationStages>, pool: WorkerPool, timeout: Duration) -> Self {
        Self { stages, pool, timeout }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Runs the whole graph under the wall-clock bound, which also covers
    /// time spent waiting for a free worker. Shape validation comes first;
    /// nothing else starts when it fails. On failure no artifact is kept.
    pub async fn evaluate(&self, req: &EvaluationRequest, plan: EvaluationPlan) -> Result<EvaluationOutcome, EvaluationError> {
        let cancel = Cancellation::new();
        let res = match tokio::time::timeout(self.timeout, self.run(req, plan, &cancel)).await {
            Ok(res) => res,
            Err(_) => Err(EvaluationError::Timeout(self.timeout)),
        };

        if res.is_err() {
            cancel.cancel();
            discard_artifacts(req).await;
        }
        res
    }

    async fn run(
        &self,
        req: &EvaluationRequest,
        plan: EvaluationPlan,
        cancel: &Cancellation,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        let report = {
            let stages = self.stages.clone();
            let input = req.input_file.clone();
            let original = req.original_file.clone();
            let cancel = cancel.clone();
            self.pool
                .run_blocking("shape", move || stages.validate_shape(&input, &original, &cancel))
                .await?
        };
        debug!(submission_id = %req.submission_id, rows = report.shape.rows, "shape accepted");

        let aggregation = plan.aggregation;
        let ((utility, metric_scores), naive_attack) = tokio::try_join!(
            self.utility(req, plan, cancel),
            self.attack(req, report.shape.rows, cancel),
        )?;

        info!(submission_id = %req.submission_id, utility, naive_attack, "evaluation finished");
        Ok(EvaluationOutcome {
            utility,
            naive_attack,
            metric_scores,
            aggregation,
            fingerprint: report.fingerprint_hex(),
        })
    }

    /// Every selected metric as its own task, then the reducer. Scores are
    /// keyed by catalog entry name.
    async fn utility(
        &self,
        req: &EvaluationRequest,
        plan: EvaluationPlan,
        cancel: &Cancellation,
    ) -> Result<(f64, BTreeMap<String, f64>), EvaluationError> {
        let mut tasks = JoinSet::new();
        for planned in plan.metrics {
            let pool = self.pool.clone();
            let stages = self.stages.clone();
            let original = req.original_file.clone();
            let anonymized = req.input_file.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let metric = planned.metric;
                let params = planned.parameters;
                let score = pool
                    .run_blocking("metric", move || {
                        stages.run_metric(&metric, &original, &anonymized, &params, &cancel)
                    })
                    .await?;
                Ok::<_, EvaluationError>((planned.name, score))
            });
        }

        let mut scores = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (name, score) = joined.map_err(|e| EvaluationError::unknown("metric", e))??;
            debug!(submission_id = %req.submission_id, metric = %name, score, "metric scored");
            scores.insert(name, score);
        }

        let values: Vec<f64> = scores.values().copied().collect();
        let utility = aggregate(&values, plan.aggregation)?;
        Ok((utility, scores))
    }

    /// The attack waits on both the footprint and the shuffled file.
    async fn attack(&self, req: &EvaluationRequest, reference_rows: usize, cancel: &Cancellation) -> Result<f64, EvaluationError> {
        let footprint = {
            let stages = self.stages.clone();
            let original = req.original_file.clone();
            let input = req.input_file.clone();
            let out = req.footprint_file.clone();
            let cancel = cancel.clone();
            self.pool.run_blocking("footprint", move || {
                stages.build_footprint(&original, &input, &out, &cancel)
            })
        };
        let shuffled = {
            let stages = self.stages.clone();
            let input = req.input_file.clone();
            let out = req.shuffled_file.clone();
            let cancel = cancel.clone();
            self.pool
                .run_blocking("shuffle", move || stages.shuffle(&input, reference_rows, &out, &cancel))
        };

        let (footprint, rows) = tokio::try_join!(footprint, shuffled)?;
        debug!(submission_id = %req.submission_id, rows, links = footprint.entry_count(), "attack inputs ready");

        let stages = self.stages.clone();
        let original = req.original_file.clone();
        let shuffled = req.shuffled_file.clone();
        let cancel = cancel.clone();
        self.pool
            .run_blocking("naive_attack", move || {
                stages.naive_attack(&original, &shuffled, &footprint, &cancel)
            })
            .await
    }
}

/// Stages check the flag again after writing, so a file finished after this
/// runs is removed by its writer.
async fn discard_artifacts(req: &EvaluationRequest) {
    for path in [&req.footprint_file, &req.shuffled_file] {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(submission_id = %req.submission_id, path = %path.display(), "artifact discarded"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(submission_id = %req.submission_id, path = %path.display(), error = %e, "artifact not removed"),
        }
    }
}
