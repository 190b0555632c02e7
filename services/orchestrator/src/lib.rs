//! Evaluation service for anonymized trace submissions: runs the utility
//! metrics, footprint, shuffle and naive attack for each submission, keeps
//! the competition state and serves it over HTTP.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod routes;
pub mod state;
pub mod types;

pub use config::AppConfig;
pub use error::EvaluationError;
pub use pipeline::{EvaluationStages, Pipeline, TraceStages};
pub use pool::WorkerPool;
pub use state::{AppState, SharedState, StateError};
pub use types::{EvaluationOutcome, EvaluationRequest, EvaluationResult, EvaluationStatus, SubmissionRecord};
