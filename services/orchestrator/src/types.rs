use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use standings::{SubmissionScore, TeamId};
use utility::AggregationMethod;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum EvaluationStatus {
    Pending,
    Processing,
    Completed,
    Failed(String),
}

impl EvaluationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EvaluationStatus::Completed | EvaluationStatus::Failed(_))
    }
}

/// Everything a pipeline run needs to locate its inputs and artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationRequest {
    pub submission_id: Uuid,
    pub input_file: PathBuf,
    pub original_file: PathBuf,
    pub shuffled_file: PathBuf,
    pub footprint_file: PathBuf,
}

/// What a successful run produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationOutcome {
    pub utility: f64,
    pub naive_attack: f64,
    pub metric_scores: BTreeMap<String, f64>,
    pub aggregation: AggregationMethod,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub utility: f64,
    pub naive_attack: f64,
    pub status: EvaluationStatus,
    pub fingerprint: Option<String>,
    pub metric_scores: BTreeMap<String, f64>,
    pub aggregation: Option<AggregationMethod>,
    pub updated_at: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn pending(now: DateTime<Utc>) -> Self {
        Self {
            utility: 0.0,
            naive_attack: 0.0,
            status: EvaluationStatus::Pending,
            fingerprint: None,
            metric_scores: BTreeMap::new(),
            aggregation: None,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EvaluationEvent {
    #[serde(rename = "start")]
    Start,

    #[serde(rename = "done")]
    Done { outcome: EvaluationOutcome },

    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub team: TeamId,
    pub name: String,
    pub request: EvaluationRequest,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub result: EvaluationResult,
}

impl SubmissionRecord {
    pub fn new(team: TeamId, name: String, request: EvaluationRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: request.submission_id,
            team,
            name,
            request,
            is_published: false,
            created_at: now,
            result: EvaluationResult::pending(now),
        }
    }

    /// Terminal states are final; later events are ignored.
    pub fn apply_event(&mut self, ev: &EvaluationEvent, now: DateTime<Utc>) {
        if self.result.status.is_terminal() {
            return;
        }
        self.result.updated_at = now;

        match ev {
            EvaluationEvent::Start => self.result.status = EvaluationStatus::Processing,
            EvaluationEvent::Done { outcome } => {
                self.result.status = EvaluationStatus::Completed;
                self.result.utility = outcome.utility;
                self.result.naive_attack = outcome.naive_attack;
                self.result.metric_scores = outcome.metric_scores.clone();
                self.result.aggregation = Some(outcome.aggregation);
                self.result.fingerprint = Some(outcome.fingerprint.clone());
            }
            EvaluationEvent::Error { message } => {
                self.result.status = EvaluationStatus::Failed(message.clone());
            }
        }
    }

    pub fn score(&self) -> Option<SubmissionScore> {
        (self.result.status == EvaluationStatus::Completed).then(|| SubmissionScore {
            submission_id: self.id,
            team: self.team.clone(),
            utility: self.result.utility,
            is_published: self.is_published,
        })
    }
}
