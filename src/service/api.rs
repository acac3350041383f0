use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use tracing::{debug, error};

use super::db::SharedTaskDb;
#[cfg(test)]
use super::db::TaskDb;
use crate::board::models::{StatusPatch, Task, TaskId};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: SharedTaskDb,
}

impl AppState {
    pub fn new(db: SharedTaskDb) -> Self {
        Self { db }
    }
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    fn internal(err: anyhow::Error) -> Self {
        error!(error = %format!("{:#}", err), "Database call failed");
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/tasks/gettasks", get(list_tasks))
        .route("/api/tasks/addtasks", post(add_task))
        .route("/api/tasks/updatetask/{id}", patch(update_task))
        .route("/api/tasks/deletetask/{id}", delete(delete_task))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_tasks(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let tasks = state
        .db
        .run("list", |db| db.list_tasks())
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(tasks))
}

async fn add_task(
    State(state): State<SharedState>,
    Json(req): Json<Task>,
) -> Result<impl IntoResponse, ApiError> {
    let task = Task {
        title: req.title.trim().to_string(),
        description: req.description.trim().to_string(),
        ..req
    };
    if task.title.is_empty() {
        return Err(ApiError::BadRequest("Task title must not be empty".into()));
    }
    if task.description.is_empty() {
        return Err(ApiError::BadRequest(
            "Task description must not be empty".into(),
        ));
    }

    let id = task.id.clone();
    let created = state
        .db
        .run("insert", move |db| db.create_task(&task))
        .await
        .map_err(ApiError::internal)?;
    match created {
        Some(task) => {
            debug!(task_id = %task.id, "Stored task");
            Ok((StatusCode::CREATED, Json(task)))
        }
        None => Err(ApiError::Conflict(format!("Task {} already exists", id))),
    }
}

async fn update_task(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<StatusPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let id = TaskId::new(id);
    let lookup = id.clone();
    let updated = state
        .db
        .run("update", move |db| db.update_status(&lookup, req.status))
        .await
        .map_err(ApiError::internal)?;
    match updated {
        Some(task) => Ok(Json(task)),
        None => Err(ApiError::NotFound(format!("Task {} not found", id))),
    }
}

async fn delete_task(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = TaskId::new(id);
    let lookup = id.clone();
    let deleted = state
        .db
        .run("delete", move |db| db.delete_task(&lookup))
        .await
        .map_err(ApiError::internal)?;
    match deleted {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(ApiError::NotFound(format!("Task {} not found", id))),
    }
}
