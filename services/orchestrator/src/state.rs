use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use standings::{rank_teams, AttackAttempt, TeamId, TeamStanding};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use traces::{grade_attack, AttackFileError, Footprint, LinkTable};
use utility::{Catalog, CatalogError, EvaluationPlan, MetricRegistry};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::EvaluationError;
use crate::pipeline::{EvaluationStages, Pipeline, TraceStages};
use crate::pool::WorkerPool;
use crate::types::{EvaluationEvent, EvaluationRequest, EvaluationResult, EvaluationStatus, SubmissionRecord};

pub type SharedState = Arc<AppState>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Submission not found: {0}")]
    NotFound(Uuid),

    #[error("Submission {id} cannot be evaluated while {status:?}")]
    NotPending { id: Uuid, status: EvaluationStatus },

    #[error("Submission {0} has no completed evaluation")]
    NotCompleted(Uuid),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    AttackFile(#[from] AttackFileError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: AppConfig,
    pub registry: MetricRegistry,
    pub pipeline: Pipeline,
    pub submissions: Arc<RwLock<HashMap<Uuid, SubmissionRecord>>>,
    pub attacks: Arc<RwLock<Vec<AttackAttempt>>>,
    pub catalog: Arc<RwLock<Catalog>>,
}

impl AppState {
    pub fn new(cfg: AppConfig) -> Self {
        let registry = MetricRegistry::builtin();
        let stages = TraceStages {
            registry: registry.clone(),
            shuffle: cfg.shuffle(),
        };
        Self::with_stages(cfg, registry, Arc::new(stages))
    }

    pub fn with_stages(cfg: AppConfig, registry: MetricRegistry, stages: Arc<dyn EvaluationStages>) -> Self {
        let catalog = Catalog::seeded(&registry, cfg.aggregation);
        let pipeline = Pipeline::new(stages, WorkerPool::new(cfg.workers), cfg.timeout);
        Self {
            cfg,
            registry,
            pipeline,
            submissions: Arc::new(RwLock::new(HashMap::new())),
            attacks: Arc::new(RwLock::new(Vec::new())),
            catalog: Arc::new(RwLock::new(catalog)),
        }
    }

    /// Registers a submission against the configured reference trace, with
    /// its artifacts under the artifact directory.
    pub async fn register(&self, team: TeamId, name: String, input_file: PathBuf) -> SubmissionRecord {
        let id = Uuid::new_v4();
        let request = EvaluationRequest {
            submission_id: id,
            input_file,
            original_file: self.cfg.original_file.clone(),
            shuffled_file: self.cfg.artifact_dir.join(format!("{id}.shuffled.tsv")),
            footprint_file: self.cfg.artifact_dir.join(format!("{id}.footprint.json")),
        };
        self.register_request(team, name, request).await
    }

    pub async fn register_request(&self, team: TeamId, name: String, request: EvaluationRequest) -> SubmissionRecord {
        let record = SubmissionRecord::new(team, name, request, Utc::now());
        info!(submission_id = %record.id, team = %record.team, "submission registered");
        self.submissions.write().await.insert(record.id, record.clone());
        record
    }

    /// Claims a pending submission and runs its evaluation in the background.
    pub async fn trigger(&self, id: Uuid) -> Result<JoinHandle<EvaluationStatus>, StateError> {
        let (request, plan) = self.claim(id).await?;
        let state = self.clone();
        Ok(tokio::spawn(async move { state.run_claimed(request, plan).await }))
    }

    /// Like [`trigger`](Self::trigger) but waits for the terminal state.
    pub async fn evaluate(&self, id: Uuid) -> Result<EvaluationStatus, StateError> {
        let (request, plan) = self.claim(id).await?;
        Ok(self.run_claimed(request, plan).await)
    }

    /// `pending → processing` under the write lock, so a submission is
    /// never evaluated twice.
    async fn claim(&self, id: Uuid) -> Result<(EvaluationRequest, EvaluationPlan), StateError> {
        let plan = self.catalog.read().await.plan();

        let mut subs = self.submissions.write().await;
        let record = subs.get_mut(&id).ok_or(StateError::NotFound(id))?;
        if record.result.status != EvaluationStatus::Pending {
            return Err(StateError::NotPending {
                id,
                status: record.result.status.clone(),
            });
        }
        record.apply_event(&EvaluationEvent::Start, Utc::now());
        info!(submission_id = %id, metrics = plan.metrics.len(), aggregation = plan.aggregation.name(), "evaluation processing");

        Ok((record.request.clone(), plan))
    }

    async fn run_claimed(&self, request: EvaluationRequest, plan: EvaluationPlan) -> EvaluationStatus {
        let id = request.submission_id;
        let event = match self.pipeline.evaluate(&request, plan).await {
            Ok(outcome) => EvaluationEvent::Done { outcome },
            Err(e) => {
                warn!(submission_id = %id, kind = e.kind(), error = %e, "evaluation failed");
                EvaluationEvent::Error { message: e.to_string() }
            }
        };

        let mut subs = self.submissions.write().await;
        match subs.get_mut(&id) {
            Some(record) => {
                record.apply_event(&event, Utc::now());
                info!(submission_id = %id, status = ?record.result.status, "evaluation finished");
                record.result.status.clone()
            }
            None => EvaluationStatus::Failed(StateError::NotFound(id).to_string()),
        }
    }

    pub async fn get_evaluation_result(&self, id: Uuid) -> Option<EvaluationResult> {
        self.submissions.read().await.get(&id).map(|r| r.result.clone())
    }

    pub async fn get_submission(&self, id: Uuid) -> Option<SubmissionRecord> {
        self.submissions.read().await.get(&id).cloned()
    }

    /// Only completed submissions can be published.
    pub async fn publish(&self, id: Uuid) -> Result<SubmissionRecord, StateError> {
        let mut subs = self.submissions.write().await;
        let record = subs.get_mut(&id).ok_or(StateError::NotFound(id))?;
        if record.result.status != EvaluationStatus::Completed {
            return Err(StateError::NotCompleted(id));
        }
        record.is_published = true;
        info!(submission_id = %id, team = %record.team, "submission published");
        Ok(record.clone())
    }

    /// Grades `guesses` against the target's footprint and records the attempt.
    pub async fn submit_attack(&self, team: TeamId, target: Uuid, guesses: LinkTable) -> Result<AttackAttempt, StateError> {
        let footprint_file = {
            let subs = self.submissions.read().await;
            let record = subs.get(&target).ok_or(StateError::NotFound(target))?;
            if record.result.status != EvaluationStatus::Completed {
                return Err(StateError::NotCompleted(target));
            }
            record.request.footprint_file.clone()
        };

        let footprint = self
            .pipeline
            .pool()
            .run_blocking("grade_attack", move || {
                Footprint::read_from(&footprint_file).map_err(|e| EvaluationError::from_trace("grade_attack", e))
            })
            .await?;
        let score = grade_attack(&footprint, &guesses)?;

        let attempt = AttackAttempt { score, team, target };
        info!(team = %attempt.team, target = %target, score, "attack graded");
        self.attacks.write().await.push(attempt.clone());
        Ok(attempt)
    }

    /// Leaderboard over every team that submitted or attacked.
    pub async fn ranking(&self) -> Vec<TeamStanding> {
        let subs = self.submissions.read().await;
        let attacks = self.attacks.read().await;

        let roster: BTreeSet<&str> = subs
            .values()
            .map(|r| r.team.as_str())
            .chain(attacks.iter().map(|a| a.team.as_str()))
            .collect();
        let roster: Vec<TeamId> = roster.into_iter().map(str::to_string).collect();
        let scores: Vec<_> = subs.values().filter_map(SubmissionRecord::score).collect();

        rank_teams(&roster, &scores, &attacks)
    }
}
