use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{AggregationMethod, MetricRegistry};

/// A configured entry of the catalog. `name` is unique; `metric` is the
/// registry implementation it runs, so one metric can be listed several
/// times with different parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    pub name: String,
    pub metric: String,
    pub parameters: Value,
    pub is_selected: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationDescriptor {
    pub name: AggregationMethod,
    pub is_selected: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("Metric not found: {0}")]
    UnknownMetric(String),

    #[error("Metric '{0}' already exists.")]
    DuplicateMetric(String),

    #[error("{0}")]
    InvalidParameters(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlannedMetric {
    pub name: String,
    pub metric: String,
    pub parameters: Value,
}

/// What a single evaluation run executes: a snapshot of the catalog taken
/// when the run starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationPlan {
    pub metrics: Vec<PlannedMetric>,
    pub aggregation: AggregationMethod,
}

/// Admin-facing list of metrics and reducers, with their selection state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
    metrics: Vec<MetricDescriptor>,
    aggregations: Vec<AggregationDescriptor>,
}

impl Catalog {
    /// Every registered metric selected with default parameters, and `method`
    /// as the only selected reducer.
    pub fn seeded(registry: &MetricRegistry, method: AggregationMethod) -> Self {
        let metrics = registry
            .names()
            .map(|name| MetricDescriptor {
                name: name.to_string(),
                metric: name.to_string(),
                parameters: Value::Object(Default::default()),
                is_selected: true,
            })
            .collect();
        let aggregations = AggregationMethod::ALL
            .into_iter()
            .map(|m| AggregationDescriptor {
                name: m,
                is_selected: m == method,
            })
            .collect();
        Self { metrics, aggregations }
    }

    pub fn metrics(&self) -> &[MetricDescriptor] {
        &self.metrics
    }

    pub fn aggregations(&self) -> &[AggregationDescriptor] {
        &self.aggregations
    }

    /// Adds an unselected entry `name` running the registered `metric`.
    pub fn add_metric(
        &mut self,
        registry: &MetricRegistry,
        name: &str,
        metric: &str,
        parameters: Value,
    ) -> Result<&MetricDescriptor, CatalogError> {
        let name = name.trim();
        let metric = metric.trim();
        let implementation = registry
            .get(metric)
            .ok_or_else(|| CatalogError::UnknownMetric(metric.to_string()))?;
        if name.is_empty() {
            return Err(CatalogError::InvalidParameters("A metric name is required.".to_string()));
        }
        if self.metrics.iter().any(|m| m.name == name) {
            return Err(CatalogError::DuplicateMetric(name.to_string()));
        }
        implementation
            .validate(&parameters)
            .map_err(|e| CatalogError::InvalidParameters(e.to_string()))?;

        self.metrics.push(MetricDescriptor {
            name: name.to_string(),
            metric: metric.to_string(),
            parameters,
            is_selected: false,
        });
        Ok(&self.metrics[self.metrics.len() - 1])
    }

    /// Flips selection and returns the new state.
    pub fn toggle_metric(&mut self, name: &str) -> Result<bool, CatalogError> {
        let m = self.metric_mut(name)?;
        m.is_selected = !m.is_selected;
        Ok(m.is_selected)
    }

    pub fn set_parameters(
        &mut self,
        registry: &MetricRegistry,
        name: &str,
        parameters: Value,
    ) -> Result<(), CatalogError> {
        let entry = self.metric_mut(name)?;
        let implementation = registry
            .get(&entry.metric)
            .ok_or_else(|| CatalogError::UnknownMetric(entry.metric.clone()))?;
        implementation
            .validate(&parameters)
            .map_err(|e| CatalogError::InvalidParameters(e.to_string()))?;
        entry.parameters = parameters;
        Ok(())
    }

    /// Selecting one reducer deselects every other.
    pub fn select_aggregation(&mut self, method: AggregationMethod) {
        for a in &mut self.aggregations {
            a.is_selected = a.name == method;
        }
        if !self.aggregations.iter().any(|a| a.is_selected) {
            self.aggregations.push(AggregationDescriptor {
                name: method,
                is_selected: true,
            });
        }
    }

    pub fn selected_aggregation(&self) -> AggregationMethod {
        self.aggregations
            .iter()
            .find(|a| a.is_selected)
            .map(|a| a.name)
            .unwrap_or_default()
    }

    pub fn plan(&self) -> EvaluationPlan {
        EvaluationPlan {
            metrics: self
                .metrics
                .iter()
                .filter(|m| m.is_selected)
                .map(|m| PlannedMetric {
                    name: m.name.clone(),
                    metric: m.metric.clone(),
                    parameters: m.parameters.clone(),
                })
                .collect(),
            aggregation: self.selected_aggregation(),
        }
    }

    fn metric_mut(&mut self, name: &str) -> Result<&mut MetricDescriptor, CatalogError> {
        self.metrics
            .iter_mut()
            .find(|m| m.name == name)
            .ok_or_else(|| CatalogError::UnknownMetric(name.to_string()))
    }
}
