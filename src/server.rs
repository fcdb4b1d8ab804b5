//! HTTP boundary: a single `POST /agent/run-once` endpoint.
//!
//! Kept deliberately thin — request parsing, auth-header extraction, and
//! status-code mapping only. Everything else is `RequestRunner`'s job.

use crate::cognition::goal::{Goal, GoalStatus, Horizon};
use crate::cycle::DryRunMode;
use crate::error::CoreError;
use crate::runner::{RequestRunner, RunRequest};
use crate::safety::rate_limiter::RateLimiter;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<RequestRunner>,
    pub rate_limiter: Arc<RateLimiter>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/agent/run-once", post(run_once_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoalInput {
    id: String,
    title: String,
    description: Option<String>,
    priority: f32,
    horizon: Horizon,
    candidate_actions: Option<Vec<String>>,
}

impl From<GoalInput> for Goal {
    fn from(input: GoalInput) -> Self {
        Goal {
            id: input.id,
            title: input.title,
            description: input.description,
            priority: input.priority.max(0.0),
            horizon: input.horizon,
            status: GoalStatus::Active,
            created_at: 0,
            updated_at: 0,
            candidate_actions: input.candidate_actions,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunOnceRequestBody {
    observation: Value,
    goal: Option<GoalInput>,
    tenant_id: Option<String>,
    dry_run: Option<DryRunMode>,
    #[serde(default)]
    auto_respond: bool,
    run_timeout_ms: Option<u64>,
}

fn rate_limit_key(headers: &HeaderMap, body: &RunOnceRequestBody) -> String {
    body.tenant_id
        .clone()
        .or_else(|| headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_string))
        .unwrap_or_else(|| "anonymous".to_string())
}

async fn run_once_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RunOnceRequestBody>,
) -> Response {
    let key = rate_limit_key(&headers, &body);
    if !state.rate_limiter.consume(&key, 1) {
        return (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "rate limited"}))).into_response();
    }

    let authorization = headers.get("authorization").and_then(|v| v.to_str().ok());
    let request = RunRequest {
        observation: body.observation,
        goal: body.goal.map(Goal::from),
        tenant_id: body.tenant_id,
        dry_run: body.dry_run,
        run_timeout_ms: body.run_timeout_ms,
    };
    let _ = body.auto_respond;

    match state.runner.run(request, authorization).await {
        Ok(outcome) => {
            let status = status_for_run_result(&outcome.result);
            let mut payload = serde_json::to_value(&outcome.result).unwrap_or_else(|_| json!({}));
            if let Value::Object(map) = &mut payload {
                map.insert("requestId".to_string(), json!(outcome.request_id));
            }
            (status, Json(payload)).into_response()
        }
        Err(err) => {
            let status = status_for_core_error(&err);
            (status, Json(json!({"error": err.to_string()}))).into_response()
        }
    }
}

fn status_for_run_result(result: &crate::cycle::RunResult) -> StatusCode {
    use crate::cycle::RunStatus::*;
    match result.status {
        Completed | Idle | DryRun => StatusCode::OK,
        Error => {
            let message = result.error.as_deref().unwrap_or("");
            if message.contains("timed out") {
                StatusCode::GATEWAY_TIMEOUT
            } else if message.contains("Invalid") || message.contains("not permitted") {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn status_for_core_error(err: &CoreError) -> StatusCode {
    StatusCode::from_u16(err.status_hint()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
