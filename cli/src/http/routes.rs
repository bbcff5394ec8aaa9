use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use std::time::Duration;
use tower_http::services::ServeDir;

use forgetube_core::api::{parse_key_points, parse_task_id, Credentials, SubmitRequest};

use crate::http::{
    models::*,
    state::AppState,
    validation::{validate_create_task, validate_feedback},
};

pub fn create_router(state: AppState) -> Router {
    let results = ServeDir::new(&state.config.output.root_dir);
    Router::new()
        .route(
            "/api/v1/tasks",
            post(create_task_handler).get(list_tasks_handler),
        )
        .route("/api/v1/tasks/:id", get(get_task_handler))
        .route("/api/v1/tasks/:id/script", get(get_script_handler))
        .route("/api/v1/tasks/:id/cancel", post(cancel_task_handler))
        .route("/api/v1/tasks/:id/refine", post(refine_task_handler))
        .route("/api/v1/tasks/:id/dispatch", post(dispatch_task_handler))
        .route("/health", get(health_handler))
        .route("/api/v1/shutdown", post(shutdown_handler))
        .nest_service("/results", results)
        .with_state(state)
}

fn tracked<T>(state: &AppState, result: Result<T, HttpServerError>) -> Result<T, HttpServerError> {
    if result.is_err() {
        state.record_error();
    }
    result
}

fn key_or_default(given: Option<String>, configured: &str) -> String {
    given
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

/// POST /api/v1/tasks
async fn create_task_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<CreateTaskResponse>), HttpServerError> {
    state.record_request("/api/v1/tasks");
    let result = async {
        validate_create_task(&req)?;
        let providers = &state.config.providers;
        let credentials = Credentials::new(
            key_or_default(req.gemini_api_key, &providers.gemini.api_key),
            key_or_default(req.serp_api_key, &providers.serp.api_key),
        );
        let id = state
            .orchestrator
            .submit(SubmitRequest {
                topic: req.topic,
                duration: req.duration.map(Duration::from_secs),
                key_points: req
                    .key_points
                    .as_deref()
                    .map(parse_key_points)
                    .unwrap_or_default(),
                credentials,
                review: req.review,
            })
            .await?;
        Ok::<_, HttpServerError>((
            StatusCode::CREATED,
            Json(CreateTaskResponse {
                success: true,
                task_id: id.to_string(),
                status_url: format!("/api/v1/tasks/{id}"),
            }),
        ))
    }
    .await;
    tracked(&state, result)
}

/// GET /api/v1/tasks
async fn list_tasks_handler(State(state): State<AppState>) -> Json<TaskListResponse> {
    state.record_request("/api/v1/tasks");
    let store = state.orchestrator.store();
    Json(TaskListResponse {
        success: true,
        tasks: state.orchestrator.list().await,
        stats: store.stats().await,
    })
}

/// GET /api/v1/tasks/:id
async fn get_task_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, HttpServerError> {
    state.record_request("/api/v1/tasks/:id");
    let result = async {
        let task = state.orchestrator.get_status(parse_task_id(&id)?).await?;
        Ok::<_, HttpServerError>(Json(TaskResponse {
            success: true,
            task,
        }))
    }
    .await;
    tracked(&state, result)
}

/// GET /api/v1/tasks/:id/script
async fn get_script_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScriptResponse>, HttpServerError> {
    state.record_request("/api/v1/tasks/:id/script");
    let result = async {
        let id = parse_task_id(&id)?;
        let status = state.orchestrator.get_status(id).await?;
        let script = state
            .orchestrator
            .script(id)
            .await?
            .ok_or_else(|| HttpServerError::NotFound(format!("task {id} has no script yet")))?;
        Ok::<_, HttpServerError>(Json(ScriptResponse {
            success: true,
            revision: status.script_revision.unwrap_or(1),
            script: script.to_raw(),
        }))
    }
    .await;
    tracked(&state, result)
}

/// POST /api/v1/tasks/:id/cancel
async fn cancel_task_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, HttpServerError> {
    state.record_request("/api/v1/tasks/:id/cancel");
    let result = async {
        let state_after = state.orchestrator.request_cancel(parse_task_id(&id)?).await?;
        Ok::<_, HttpServerError>(Json(CancelResponse {
            success: true,
            state: state_after,
        }))
    }
    .await;
    tracked(&state, result)
}

/// POST /api/v1/tasks/:id/refine
async fn refine_task_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RefineRequest>,
) -> Result<Json<TaskResponse>, HttpServerError> {
    state.record_request("/api/v1/tasks/:id/refine");
    let result = async {
        validate_feedback(&req.feedback)?;
        let task = state
            .orchestrator
            .refine(parse_task_id(&id)?, req.feedback)
            .await?;
        Ok::<_, HttpServerError>(Json(TaskResponse {
            success: true,
            task,
        }))
    }
    .await;
    tracked(&state, result)
}

/// POST /api/v1/tasks/:id/dispatch
async fn dispatch_task_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, HttpServerError> {
    state.record_request("/api/v1/tasks/:id/dispatch");
    let result = async {
        let id = parse_task_id(&id)?;
        state.orchestrator.dispatch(id).await?;
        Ok::<_, HttpServerError>(Json(serde_json::json!({
            "success": true,
            "task_id": id.to_string(),
        })))
    }
    .await;
    tracked(&state, result)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let running = state.orchestrator.store().stats().await.running;
    let (uptime_seconds, requests_handled) = state
        .stats
        .read()
        .map(|s| (s.uptime_seconds(), s.requests_total))
        .unwrap_or((0.0, 0));

    Json(HealthResponse {
        status: "healthy".into(),
        session_id: state.session_id.clone(),
        uptime_seconds,
        requests_handled,
        tasks_running: running,
        timestamp: Local::now().to_rfc3339(),
    })
}

/// POST /api/v1/shutdown
async fn shutdown_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let _ = state.shutdown_tx.send(());

    Json(serde_json::json!({
        "success": true,
        "message": "Server shutting down"
    }))
}
