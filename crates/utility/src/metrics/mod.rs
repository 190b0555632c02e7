//! The built-in utility metrics and their static registry.
//!
//! Every metric reads the original and anonymized files in lockstep and
//! returns a score in `[0, 1]`, or the first offending line.

mod poi;
mod hour_gap;
mod crossings;
mod movement;

pub use poi::{PoiParams, PoiRetention};
pub use hour_gap::{HourGap, HOUR_PENALTY};
pub use crossings::{Crossings, CrossingsParams};
pub use movement::{Movement, MovementParams};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use traces::Cancellation;

use crate::MetricError;

pub trait Metric: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rejects parameter objects this metric cannot run with.
    fn validate(&self, params: &Value) -> Result<(), MetricError>;

    /// Stops with an error once `cancel` is set.
    fn score(&self, original: &Path, anonymized: &Path, params: &Value, cancel: &Cancellation) -> Result<f64, MetricError>;
}

/// `null` and `{}` both mean "all defaults".
pub(crate) fn parse_params<T: DeserializeOwned + Default>(metric: &str, params: &Value) -> Result<T, MetricError> {
    match params {
        Value::Null => Ok(T::default()),
        Value::Object(_) => serde_json::from_value(params.clone()).map_err(|e| MetricError::InvalidParameters {
            metric: metric.to_string(),
            reason: e.to_string(),
        }),
        other => Err(MetricError::InvalidParameters {
            metric: metric.to_string(),
            reason: format!("expected an object, got {other}"),
        }),
    }
}

/// Name → metric lookup, populated once at startup.
#[derive(Clone, Default)]
pub struct MetricRegistry {
    metrics: BTreeMap<&'static str, Arc<dyn Metric>>,
}

impl MetricRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut r = Self::empty();
        r.register(PoiRetention);
        r.register(HourGap);
        r.register(Crossings);
        r.register(Movement);
        r
    }

    pub fn register(&mut self, metric: impl Metric + 'static) {
        self.metrics.insert(metric.name(), Arc::new(metric));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Metric>> {
        self.metrics.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.metrics.keys().copied()
    }

    pub fn run(
        &self,
        name: &str,
        original: &Path,
        anonymized: &Path,
        params: &Value,
        cancel: &Cancellation,
    ) -> Result<f64, MetricError> {
        let metric = self
            .get(name)
            .ok_or_else(|| MetricError::UnknownMetric(name.to_string()))?;
        metric.score(original, anonymized, params, cancel)
    }
}
