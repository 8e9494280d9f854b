//! Job service REST API module
//!
//! Stateless 1:1 translation between the HTTP surface and the job
//! registry. Handlers return structured JSON envelopes and never leak
//! raw internal diagnostics to callers.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::job::{
    ExecResult, JobFailure, JobId, JobParameters, JobRecord, JobState, JobSummary, OutputLine,
};
use crate::registry::{JobRegistry, RegistryError};

// ===== Application State =====

/// Application state for the job API
#[derive(Clone)]
pub struct ApiAppState {
    pub registry: Arc<JobRegistry>,
}

impl ApiAppState {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }
}

// ===== Errors =====

/// API-facing error with an HTTP status and a safe message
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
}

impl From<RegistryError> for ApiError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::Validation(msg) => Self::BadRequest(msg),
            RegistryError::NotFound(job_id) => Self::NotFound(format!("Job not found: {job_id}")),
            RegistryError::NotRunning(job_id) => {
                Self::Conflict(format!("Job not running: {job_id}"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "status": "error",
            "message": message,
        }));
        (status, body).into_response()
    }
}

// ===== DTOs =====

/// Submission acknowledgement DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponseDto {
    pub status: String,
    pub job_id: JobId,
}

/// Job record snapshot DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusDto {
    pub job_id: JobId,
    pub state: JobState,
    pub parameters: JobParameters,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub result: Option<ExecResult>,
    pub error: Option<JobFailure>,
    pub line_count: usize,
}

impl From<JobRecord> for JobStatusDto {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.job_id,
            state: record.state,
            parameters: record.parameters,
            created_at: record.created_at,
            started_at: record.started_at,
            ended_at: record.ended_at,
            result: record.result,
            error: record.error,
            line_count: record.output.len(),
        }
    }
}

/// Incremental output response DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputResponseDto {
    pub job_id: JobId,
    pub lines: Vec<OutputLine>,
    pub next_cursor: u64,
}

/// Job listing response DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListDto {
    pub jobs: Vec<JobSummary>,
    pub total: usize,
}

/// Stop acknowledgement DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponseDto {
    pub status: String,
    pub job_id: JobId,
}

/// Health response DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDto {
    pub status: String,
    pub active_jobs: usize,
    pub total_jobs: usize,
}

/// Cleanup request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupRequestDto {
    pub retention_seconds: u64,
}

/// Cleanup response DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResponseDto {
    pub removed_count: usize,
    pub remaining: usize,
}

#[derive(Debug, Deserialize)]
pub struct OutputQuery {
    #[serde(default)]
    pub since: u64,
}

// ===== API Handlers =====

/// Coerce the submitted JSON object into the opaque parameter map.
/// Numbers and booleans are accepted and stringified, matching how
/// callers send numeric list ids.
fn parameters_from_json(payload: Value) -> Result<JobParameters, ApiError> {
    let object = match payload {
        Value::Object(object) => object,
        _ => {
            return Err(ApiError::BadRequest(
                "Request body must be a JSON object".to_string(),
            ));
        }
    };

    let mut parameters = JobParameters::new();
    for (key, value) in object {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                return Err(ApiError::BadRequest(format!(
                    "Parameter '{key}' must be a scalar value"
                )));
            }
        };
        parameters.insert(key, value);
    }
    Ok(parameters)
}

pub async fn submit_job_handler(
    State(state): State<ApiAppState>,
    Json(payload): Json<Value>,
) -> Result<Json<SubmitResponseDto>, ApiError> {
    let parameters = parameters_from_json(payload)?;

    let (job_id, _handle) = state.registry.submit(parameters).await?;
    info!("Job accepted: {}", job_id);

    Ok(Json(SubmitResponseDto {
        status: "success".to_string(),
        job_id,
    }))
}

pub async fn job_status_handler(
    State(state): State<ApiAppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<JobStatusDto>, ApiError> {
    let record = state.registry.status(&job_id).await?;
    Ok(Json(record.into()))
}

pub async fn job_output_handler(
    State(state): State<ApiAppState>,
    Path(job_id): Path<JobId>,
    Query(query): Query<OutputQuery>,
) -> Result<Json<OutputResponseDto>, ApiError> {
    let lines = state.registry.output(&job_id, query.since).await?;
    let next_cursor = lines
        .last()
        .map(|line| line.sequence_index)
        .unwrap_or(query.since);

    Ok(Json(OutputResponseDto {
        job_id,
        lines,
        next_cursor,
    }))
}

pub async fn list_jobs_handler(State(state): State<ApiAppState>) -> Json<JobListDto> {
    let jobs = state.registry.list().await;
    let total = jobs.len();
    Json(JobListDto { jobs, total })
}

pub async fn stop_job_handler(
    State(state): State<ApiAppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<StopResponseDto>, ApiError> {
    match state.registry.stop(&job_id).await {
        Ok(()) => {
            info!("Stop requested for job {}", job_id);
            Ok(Json(StopResponseDto {
                status: "stopping".to_string(),
                job_id,
            }))
        }
        Err(e) => {
            warn!("Stop rejected for job {}: {}", job_id, e);
            Err(e.into())
        }
    }
}

pub async fn health_handler(State(state): State<ApiAppState>) -> Json<HealthDto> {
    Json(HealthDto {
        status: "healthy".to_string(),
        active_jobs: state.registry.active_count().await,
        total_jobs: state.registry.total_count().await,
    })
}

pub async fn cleanup_handler(
    State(state): State<ApiAppState>,
    Json(request): Json<CleanupRequestDto>,
) -> Json<CleanupResponseDto> {
    let removed_count = state.registry.cleanup(request.retention_seconds).await;
    let remaining = state.registry.total_count().await;
    info!(removed_count, remaining, "Cleanup requested");
    Json(CleanupResponseDto {
        removed_count,
        remaining,
    })
}

// ===== Router =====

/// Assemble the API router over a registry
pub fn api_routes(state: ApiAppState) -> Router {
    Router::new()
        .route("/api/jobs", post(submit_job_handler).get(list_jobs_handler))
        .route("/api/jobs/{id}/status", get(job_status_handler))
        .route("/api/jobs/{id}/output", get(job_output_handler))
        .route("/api/jobs/{id}/stop", post(stop_job_handler))
        .route("/api/health", get(health_handler))
        .route("/api/cleanup", post(cleanup_handler))
        .with_state(state)
}
