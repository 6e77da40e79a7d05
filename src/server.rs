//! HTTP front end.
//!
//! Serves a single-page form and a JSON API over one shared [`Agent`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Query form |
//! | `POST` | `/api/query` | `{query}` → answer, timing, intent, sources |
//! | `GET`  | `/api/history?n=` | Last n exchanges (default 5, max 50) |
//! | `POST` | `/api/history/clear` | Empty the history |
//! | `POST` | `/api/history/export` | Write the history to the export directory |
//! | `GET`  | `/api/stats` | History statistics |
//! | `GET`  | `/api/status` | Data and index status |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Please enter a question about your competitors." } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500). Malformed JSON bodies
//! and unparsable query parameters are reported as `bad_request` too.
//!
//! The agent sits behind a `tokio::sync::Mutex`, so requests are handled one
//! at a time and every browser session shares a single history.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use rival_radar_core::history::{HistoryStats, QueryHistoryEntry};

use crate::agent::{build_agent, Agent, AgentStatus, QueryOutcome};
use crate::cli::{DEFAULT_HISTORY_COUNT, MAX_HISTORY_COUNT};
use crate::config::Config;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    agent: Arc<Mutex<Agent>>,
}

/// Build the router around an already initialized agent.
pub fn router(agent: Arc<Mutex<Agent>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/api/query", post(handle_query))
        .route("/api/history", get(handle_history))
        .route("/api/history/clear", post(handle_clear))
        .route("/api/history/export", post(handle_export))
        .route("/api/stats", get(handle_stats))
        .route("/api/status", get(handle_status))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { agent })
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let mut agent = build_agent(config)?;
    let report = agent.initialize().await?;
    if report.created_sample {
        tracing::warn!(path = %config.data.csv_path.display(), "no data file found, created sample dataset");
    }

    let app = router(Arc::new(Mutex::new(agent)));
    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!(addr = %bind_addr, competitors = report.records.len(), "server listening");
    println!("Rival Radar listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET / ============

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Rival Radar</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
  textarea { width: 100%; height: 5rem; }
  pre { white-space: pre-wrap; background: #f4f4f4; padding: 1rem; }
  .meta { color: #666; font-size: 0.9em; }
</style>
</head>
<body>
<h1>Rival Radar</h1>
<p>Ask a question about your competitors.</p>
<form id="ask">
  <textarea name="query" placeholder="Compare TechCorp and InnovateLabs marketing strategies"></textarea>
  <button type="submit">Ask</button>
</form>
<pre id="answer"></pre>
<p class="meta" id="meta"></p>
<script>
document.getElementById('ask').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const query = ev.target.query.value;
  const answer = document.getElementById('answer');
  const meta = document.getElementById('meta');
  answer.textContent = 'Thinking...';
  meta.textContent = '';
  const res = await fetch('/api/query', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify({ query }),
  });
  const body = await res.json();
  if (!res.ok) {
    answer.textContent = body.error.message;
    return;
  }
  answer.textContent = body.answer;
  meta.textContent = (body.elapsed_ms / 1000).toFixed(2) + 's, intent: ' + body.intent
    + (body.fallback_used ? ', keyword fallback' : '');
});
</script>
</body>
</html>
"#;

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// ============ POST /api/query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

async fn handle_query(
    State(state): State<AppState>,
    req: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryOutcome>, AppError> {
    let Json(req) = req.map_err(|rejection| bad_request(rejection.body_text()))?;
    let mut agent = state.agent.lock().await;
    let outcome = agent
        .process_query(&req.query)
        .await
        .map_err(|rejection| bad_request(rejection.to_string()))?;
    Ok(Json(outcome))
}

// ============ /api/history ============

#[derive(Deserialize)]
struct HistoryParams {
    n: Option<usize>,
}

#[derive(Serialize)]
struct HistoryResponse {
    entries: Vec<QueryHistoryEntry>,
}

async fn handle_history(
    State(state): State<AppState>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<HistoryResponse>, AppError> {
    let Query(params) = params.map_err(|rejection| bad_request(rejection.body_text()))?;
    let n = params
        .n
        .unwrap_or(DEFAULT_HISTORY_COUNT)
        .clamp(1, MAX_HISTORY_COUNT);
    let agent = state.agent.lock().await;
    Ok(Json(HistoryResponse {
        entries: agent.recent_history(n),
    }))
}

#[derive(Serialize)]
struct ClearResponse {
    cleared: usize,
}

async fn handle_clear(State(state): State<AppState>) -> Json<ClearResponse> {
    let mut agent = state.agent.lock().await;
    let cleared = agent.history().len();
    agent.clear_history();
    Json(ClearResponse { cleared })
}

#[derive(Serialize)]
struct ExportResponse {
    path: PathBuf,
    entries: usize,
}

async fn handle_export(State(state): State<AppState>) -> Result<Json<ExportResponse>, AppError> {
    let agent = state.agent.lock().await;
    let path = agent
        .export_history(None)
        .map_err(|e| internal(format!("{e:#}")))?;
    Ok(Json(ExportResponse {
        path,
        entries: agent.history().len(),
    }))
}

// ============ GET /api/stats, /api/status ============

async fn handle_stats(State(state): State<AppState>) -> Json<HistoryStats> {
    Json(state.agent.lock().await.history().stats())
}

async fn handle_status(State(state): State<AppState>) -> Json<AgentStatus> {
    Json(state.agent.lock().await.status().await)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
