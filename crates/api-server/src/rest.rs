//! REST API handlers for model creation, action selection, outcome recording
//! and operational endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bandit_core::{AlgorithmConfig, AlgorithmKind, BanditError, Model, ModelKey, SelectionToken};
use bandit_rl_engine::ActionInsight;
use bandit_service::BanditService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Maximum number of actions per model.
const MAX_ACTIONS: usize = 1024;

/// Maximum context vector length.
const MAX_FEATURES: usize = 512;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BanditService>,
    pub node_id: String,
    pub start_time: Instant,
}

/// Envelope shared by every JSON response.
#[derive(Debug, Serialize, Deserialize)]
pub struct GeneralResponse<T> {
    pub status_code: u16,
    pub message: String,
    pub data: T,
}

impl<T> GeneralResponse<T> {
    fn ok(status: StatusCode, data: T) -> Self {
        Self {
            status_code: status.as_u16(),
            message: "OK".to_string(),
            data,
        }
    }
}

/// Maps the error taxonomy onto HTTP statuses.
pub struct ApiError(pub BanditError);

impl From<BanditError> for ApiError {
    fn from(err: BanditError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            BanditError::InvalidConfig(_)
            | BanditError::UnknownAction(_)
            | BanditError::InvalidReward(_)
            | BanditError::InvalidContext => StatusCode::BAD_REQUEST,
            BanditError::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BanditError::NotFound(_) => StatusCode::NOT_FOUND,
            BanditError::AlreadyExists(_)
            | BanditError::VersionConflict { .. }
            | BanditError::Conflict { .. } => StatusCode::CONFLICT,
            BanditError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BanditError::CorruptState(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
            metrics::counter!("api.errors").increment(1);
        } else {
            warn!(error = %self.0, "Request rejected");
            metrics::counter!("api.rejections").increment(1);
        }
        let body = GeneralResponse {
            status_code: status.as_u16(),
            message: self.0.to_string(),
            data: serde_json::json!({}),
        };
        (status, Json(body)).into_response()
    }
}

fn default_model_version() -> String {
    "1".to_string()
}

fn default_alpha() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
pub struct CreateModelRequest {
    pub model_name: String,
    #[serde(default = "default_model_version")]
    pub model_version: String,
    pub algorithm: AlgorithmKind,
    pub actions: Vec<String>,
    pub epsilon: Option<f64>,
    pub n_features: Option<usize>,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

impl CreateModelRequest {
    /// Pick out the hyperparameters the chosen algorithm needs.
    pub fn config(&self) -> Result<AlgorithmConfig, BanditError> {
        match self.algorithm {
            AlgorithmKind::EpsilonGreedy => {
                let epsilon = self.epsilon.ok_or_else(|| {
                    BanditError::InvalidConfig("egreedy requires 'epsilon'".into())
                })?;
                Ok(AlgorithmConfig::EpsilonGreedy { epsilon })
            }
            AlgorithmKind::LinUcb => {
                let n_features = self.n_features.ok_or_else(|| {
                    BanditError::InvalidConfig("linucb requires 'n_features'".into())
                })?;
                Ok(AlgorithmConfig::LinUcb {
                    n_features,
                    alpha: self.alpha,
                })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectActionRequest {
    pub model_name: String,
    #[serde(default = "default_model_version")]
    pub model_version: String,
    pub context: Option<Vec<f64>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectActionResponse {
    pub action: String,
    pub selection_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordOutcomeRequest {
    pub model_name: String,
    #[serde(default = "default_model_version")]
    pub model_version: String,
    pub action: String,
    pub reward: f64,
    pub context: Option<Vec<f64>>,
    /// Token returned by select-action; only used to report how stale the
    /// decision was.
    pub selection_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordOutcomeResponse {
    pub counter: u64,
}

#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub model_name: String,
    pub model_version: String,
    #[serde(flatten)]
    pub config: AlgorithmConfig,
    pub actions: Vec<String>,
    pub counter: u64,
    pub created_at: DateTime<Utc>,
    pub insights: Vec<ActionInsight>,
}

impl ModelSummary {
    fn new(model: Model, insights: Vec<ActionInsight>) -> Self {
        Self {
            model_name: model.key.name,
            model_version: model.key.version,
            config: model.state.config,
            actions: model.state.actions,
            counter: model.counter,
            created_at: model.state.created_at,
            insights,
        }
    }
}

fn check_context(context: &Option<Vec<f64>>) -> Result<(), ApiError> {
    match context {
        Some(x) if x.len() > MAX_FEATURES => Err(ApiError(BanditError::InvalidConfig(format!(
            "context exceeds {MAX_FEATURES} features"
        )))),
        _ => Ok(()),
    }
}

/// POST /v1/models/create
pub async fn create_model(
    State(state): State<AppState>,
    Json(request): Json<CreateModelRequest>,
) -> Result<(StatusCode, Json<GeneralResponse<ModelSummary>>), ApiError> {
    if request.actions.len() > MAX_ACTIONS {
        return Err(ApiError(BanditError::InvalidConfig(format!(
            "a model may have at most {MAX_ACTIONS} actions"
        ))));
    }
    let config = request.config()?;
    let key = ModelKey::new(request.model_name, request.model_version);

    let model = state
        .service
        .create_model(key, config, request.actions)
        .await?;
    let insights = bandit_rl_engine::inspect(&model.state)?;

    Ok((
        StatusCode::CREATED,
        Json(GeneralResponse::ok(
            StatusCode::CREATED,
            ModelSummary::new(model, insights),
        )),
    ))
}

/// POST /v1/bandit/select-action
pub async fn select_action(
    State(state): State<AppState>,
    Json(request): Json<SelectActionRequest>,
) -> Result<Json<GeneralResponse<SelectActionResponse>>, ApiError> {
    check_context(&request.context)?;
    let key = ModelKey::new(request.model_name, request.model_version);

    let selection = state
        .service
        .select_action(&key, request.context.as_deref())
        .await?;

    Ok(Json(GeneralResponse::ok(
        StatusCode::OK,
        SelectActionResponse {
            action: selection.action,
            selection_token: selection.token.to_string(),
        },
    )))
}

/// POST /v1/bandit/record-outcome
pub async fn record_outcome(
    State(state): State<AppState>,
    Json(request): Json<RecordOutcomeRequest>,
) -> Result<Json<GeneralResponse<RecordOutcomeResponse>>, ApiError> {
    check_context(&request.context)?;
    let token = request
        .selection_token
        .as_deref()
        .map(str::parse::<SelectionToken>)
        .transpose()?;
    let key = ModelKey::new(request.model_name, request.model_version);
    if let Some(token) = &token {
        if token.key != key {
            return Err(ApiError(BanditError::InvalidConfig(format!(
                "selection token belongs to {}, not {key}",
                token.key
            ))));
        }
    }

    let counter = state
        .service
        .record_outcome(
            &key,
            &request.action,
            request.reward,
            request.context.as_deref(),
        )
        .await?;

    if let Some(token) = token {
        // counter - 1 is the version this update was applied on top of.
        debug!(
            model = %key,
            updates_since_selection = counter.saturating_sub(1).saturating_sub(token.counter),
            "Delayed reward attributed"
        );
    }

    Ok(Json(GeneralResponse::ok(
        StatusCode::OK,
        RecordOutcomeResponse { counter },
    )))
}

/// GET /v1/models/:name/:version
pub async fn get_model(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
) -> Result<Json<GeneralResponse<ModelSummary>>, ApiError> {
    let key = ModelKey::new(name, version);
    let (model, insights) = state.service.describe(&key).await?;

    Ok(Json(GeneralResponse::ok(
        StatusCode::OK,
        ModelSummary::new(model, insights),
    )))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready: readiness probe for Kubernetes.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live: liveness probe for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}
