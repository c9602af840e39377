use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::conversation::{Thread, ThreadId, ThreadSummary};
use crate::errors::WorkflowError;
use crate::workflow::engine::latest_artifact;
use crate::workflow::{RunReport, Workflow};

pub struct AppState {
    pub workflow: Workflow,
    /// One async mutex per thread so runs on the same thread never interleave.
    thread_locks: Mutex<HashMap<ThreadId, Arc<Mutex<()>>>>,
}

impl AppState {
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow,
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, id: &ThreadId) -> Arc<Mutex<()>> {
        self.thread_locks
            .lock()
            .await
            .entry(id.clone())
            .or_default()
            .clone()
    }

    /// Forget the lock for `id` once no request holds it.
    async fn release(&self, id: &ThreadId) {
        let mut locks = self.thread_locks.lock().await;
        if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(id);
        }
    }
}

pub type SharedState = Arc<AppState>;

// ── Request / response payloads ───────────────────────────────────────

#[derive(Deserialize)]
pub struct ChatRequest {
    pub user_query: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub thread_id: String,
    pub status: String,
    pub response: String,
    pub html: String,
    pub css: String,
    pub js: String,
}

impl From<&RunReport> for ChatResponse {
    fn from(report: &RunReport) -> Self {
        let artifact = report.artifact();
        Self {
            thread_id: report.thread_id().to_string(),
            status: report.thread.checkpoint.status_label().to_string(),
            response: report.response().to_string(),
            html: artifact.html,
            css: artifact.css,
            js: artifact.javascript,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub origin: String,
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadDetail {
    pub thread_id: String,
    pub status: String,
    pub history: Vec<HistoryEntry>,
    pub html: String,
    pub css: String,
    pub js: String,
}

impl From<&Thread> for ThreadDetail {
    fn from(thread: &Thread) -> Self {
        let artifact = latest_artifact(&thread.log);
        Self {
            thread_id: thread.id.to_string(),
            status: thread.checkpoint.status_label().to_string(),
            history: thread
                .log
                .turns()
                .iter()
                .map(|t| HistoryEntry {
                    origin: t.origin.to_string(),
                    role: t.origin.chat_role().to_string(),
                    content: t.content.clone(),
                })
                .collect(),
            html: artifact.html,
            css: artifact.css,
            js: artifact.javascript,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadList {
    pub threads: Vec<ThreadSummary>,
}

// ── Errors ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    /// The model backend failed or returned an unusable decision.
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let msg = err.to_string();
        match err {
            WorkflowError::UnknownThread(_) => ApiError::NotFound(msg),
            WorkflowError::EmptyInput => ApiError::BadRequest(msg),
            WorkflowError::ThreadExists(_) => ApiError::Conflict(msg),
            e if e.is_model_failure() => ApiError::Upstream(msg),
            _ => ApiError::Internal(msg),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/threads", get(list_threads))
        .route("/api/threads/{id}", get(get_thread))
        .route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "ok"
}

async fn chat(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let requested = req
        .thread_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ThreadId::new);
    let continues = requested.is_some();
    let id = requested
        .unwrap_or_else(|| ThreadId::for_request(req.user_query.trim(), Utc::now()));

    let lock = state.lock_for(&id).await;
    let result = {
        let _guard = lock.lock().await;
        run_chat(&state.workflow, id.clone(), continues, &req.user_query).await
    };
    drop(lock);
    state.release(&id).await;

    let report = result.inspect_err(|e| tracing::warn!(error = %e, "chat request failed"))?;

    tracing::info!(thread = %report.thread_id(), outcome = ?report.outcome, "chat request complete");
    Ok(Json(ChatResponse::from(&report)))
}

/// Continue a stored thread, or create one under `id`.
async fn run_chat(
    workflow: &Workflow,
    id: ThreadId,
    continues: bool,
    query: &str,
) -> Result<RunReport, WorkflowError> {
    if continues && workflow.store().load(&id).await?.is_some() {
        workflow.submit(&id, query).await
    } else {
        workflow.start_with_id(id, query).await
    }
}

async fn list_threads(State(state): State<SharedState>) -> Result<Json<ThreadList>, ApiError> {
    let threads = state.workflow.threads().await?;
    Ok(Json(ThreadList { threads }))
}

async fn get_thread(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ThreadDetail>, ApiError> {
    let thread = state.workflow.load(&ThreadId::new(id)).await?;
    Ok(Json(ThreadDetail::from(&thread)))
}
