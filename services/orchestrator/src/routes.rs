use std::path::PathBuf;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use standings::{AttackAttempt, TeamStanding};
use tower_http::cors::CorsLayer;
use traces::LinkTable;
use utility::{AggregationDescriptor, AggregationMethod, CatalogError, MetricDescriptor};
use uuid::Uuid;

use crate::state::{SharedState, StateError};
use crate::types::{EvaluationResult, SubmissionRecord};

type ApiError = (StatusCode, String);

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/submissions", post(create_submission))
        .route("/submissions/:id", get(get_submission))
        .route("/submissions/:id/publish", post(publish_submission))
        .route("/submissions/:id/attacks", post(post_attack))
        .route("/ranking", get(get_ranking))
        .route("/metrics", get(get_metrics).post(post_metric))
        .route("/metrics/:name/toggle", patch(toggle_metric))
        .route("/metrics/:name/parameters", put(put_parameters))
        .route("/aggregations/:name/select", put(select_aggregation))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_error(e: StateError) -> ApiError {
    let code = match &e {
        StateError::NotFound(_) => StatusCode::NOT_FOUND,
        StateError::NotPending { .. } => StatusCode::CONFLICT,
        StateError::NotCompleted(_) | StateError::AttackFile(_) => StatusCode::BAD_REQUEST,
        StateError::Catalog(CatalogError::UnknownMetric(_)) => StatusCode::NOT_FOUND,
        StateError::Catalog(CatalogError::DuplicateMetric(_)) => StatusCode::CONFLICT,
        StateError::Catalog(CatalogError::InvalidParameters(_)) => StatusCode::BAD_REQUEST,
        StateError::Evaluation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, e.to_string())
}

#[derive(Deserialize)]
pub struct CreateSubmissionRequest {
    pub team: String,
    pub name: String,
    /// Already-stored anonymized trace; uploads are handled upstream.
    pub file_path: PathBuf,
}

#[derive(Serialize)]
pub struct SubmissionCreatedResponse {
    pub submission_id: Uuid,
    pub result: EvaluationResult,
}

pub async fn create_submission(
    State(state): State<SharedState>,
    Json(req): Json<CreateSubmissionRequest>,
) -> Result<(StatusCode, Json<SubmissionCreatedResponse>), ApiError> {
    if req.team.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "team is required".to_string()));
    }
    let record = state.register(req.team, req.name, req.file_path).await;
    state.trigger(record.id).await.map_err(api_error)?;

    let result = state
        .get_evaluation_result(record.id)
        .await
        .unwrap_or(record.result);
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmissionCreatedResponse {
            submission_id: record.id,
            result,
        }),
    ))
}

pub async fn get_submission(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionRecord>, ApiError> {
    state
        .get_submission(id)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Submission not found".to_string()))
}

pub async fn publish_submission(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionRecord>, ApiError> {
    state.publish(id).await.map(Json).map_err(api_error)
}

#[derive(Deserialize)]
pub struct AttackRequest {
    pub team: String,
    pub guesses: LinkTable,
}

pub async fn post_attack(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AttackRequest>,
) -> Result<(StatusCode, Json<AttackAttempt>), ApiError> {
    let attempt = state
        .submit_attack(req.team, id, req.guesses)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

pub async fn get_ranking(State(state): State<SharedState>) -> Json<Vec<TeamStanding>> {
    Json(state.ranking().await)
}

#[derive(Serialize)]
pub struct CatalogResponse {
    pub metrics: Vec<MetricDescriptor>,
    pub aggregations: Vec<AggregationDescriptor>,
}

pub async fn get_metrics(State(state): State<SharedState>) -> Json<CatalogResponse> {
    let catalog = state.catalog.read().await;
    Json(CatalogResponse {
        metrics: catalog.metrics().to_vec(),
        aggregations: catalog.aggregations().to_vec(),
    })
}

#[derive(Deserialize)]
pub struct AddMetricRequest {
    pub name: String,
    /// Registry metric behind the entry; defaults to `name`.
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub parameters: Value,
}

pub async fn post_metric(
    State(state): State<SharedState>,
    Json(req): Json<AddMetricRequest>,
) -> Result<(StatusCode, Json<MetricDescriptor>), ApiError> {
    let mut catalog = state.catalog.write().await;
    let added = catalog
        .add_metric(&state.registry, &req.name, req.metric.as_deref().unwrap_or(&req.name), req.parameters)
        .map_err(|e| api_error(e.into()))?;
    Ok((StatusCode::CREATED, Json(added.clone())))
}

#[derive(Serialize)]
pub struct ToggleResponse {
    pub name: String,
    pub is_selected: bool,
}

pub async fn toggle_metric(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let is_selected = state
        .catalog
        .write()
        .await
        .toggle_metric(&name)
        .map_err(|e| api_error(e.into()))?;
    Ok(Json(ToggleResponse { name, is_selected }))
}

pub async fn put_parameters(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(parameters): Json<Value>,
) -> Result<StatusCode, ApiError> {
    state
        .catalog
        .write()
        .await
        .set_parameters(&state.registry, &name, parameters)
        .map_err(|e| api_error(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn select_aggregation(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let method = AggregationMethod::parse(&name)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Aggregation not found: {name}")))?;
    state.catalog.write().await.select_aggregation(method);
    Ok(StatusCode::NO_CONTENT)
}
