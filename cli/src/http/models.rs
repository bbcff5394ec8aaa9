use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use forgetube_core::api::{
    OrchestratorError, RawScript, StoreError, StoreStats, TaskState, TaskStatus,
};

// ============= Tasks =============

/// Body of `POST /api/v1/tasks`. Keys left out fall back to the keys in the
/// server config.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub topic: String,
    #[serde(default)]
    pub duration: Option<u64>,
    /// Comma separated text, as typed into a form.
    #[serde(default)]
    pub key_points: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub serp_api_key: Option<String>,
    #[serde(default)]
    pub review: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    pub success: bool,
    pub task_id: String,
    pub status_url: String,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub success: bool,
    pub task: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub success: bool,
    pub tasks: Vec<TaskStatus>,
    pub stats: StoreStats,
}

#[derive(Debug, Serialize)]
pub struct ScriptResponse {
    pub success: bool,
    pub revision: u32,
    pub script: RawScript,
}

#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    pub feedback: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub state: TaskState,
}

// ============= Health =============

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub session_id: String,
    pub uptime_seconds: f64,
    pub requests_handled: u64,
    pub tasks_running: usize,
    pub timestamp: String,
}

// ============= Error Handling =============

#[derive(Debug)]
pub enum HttpServerError {
    InvalidRequest(String),
    NotFound(String),
    Conflict(String),
    Pipeline(String),
    Timeout,
    Internal(String),
}

impl From<OrchestratorError> for HttpServerError {
    fn from(err: OrchestratorError) -> Self {
        let message = err.to_string();
        match err {
            OrchestratorError::InvalidRequest(_) => Self::InvalidRequest(message),
            OrchestratorError::NotFound(_) => Self::NotFound(message),
            OrchestratorError::NotAwaitingReview { .. } => Self::Conflict(message),
            OrchestratorError::Refinement(_) => Self::Pipeline(message),
            OrchestratorError::Store(StoreError::AlreadyRunning(_) | StoreError::Duplicate(_)) => {
                Self::Conflict(message)
            }
            OrchestratorError::Store(_) => Self::Internal(message),
        }
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            Self::Pipeline(msg) => (StatusCode::BAD_GATEWAY, "PIPELINE_ERROR", msg),
            Self::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT",
                "Request timeout".to_string(),
            ),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = serde_json::json!({
            "success": false,
            "error": message,
            "error_code": error_code,
        });

        (status, Json(body)).into_response()
    }
}
