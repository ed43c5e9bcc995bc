//! Auth token, registry, cleanup, dashboard and health endpoints.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::adapters::postgres;
use crate::api::error::{ApiError, ApiResult};
use crate::api::rate_limit::too_many_requests;
use crate::api::{request_source, AppState};
use crate::domain::errors::DomainError;
use crate::domain::models::AgentRegistryEntry;
use crate::services::{CleanupStats, PostRegistryEntry};

#[derive(Deserialize)]
pub struct TokenBody {
    agent_id: String,
    session_id: Option<String>,
}

/// Mint an HMAC token. Hard rate limit: 10 per 15 minutes per source.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<TokenBody>,
) -> Response {
    let source = request_source(&headers);
    if let Err(retry_after) = state.rate_limits.check_auth(&source) {
        return too_many_requests(retry_after);
    }

    match state.tokens.issue(&body.agent_id, body.session_id.as_deref()) {
        Ok(token) => Json(serde_json::json!({
            "token": token,
            "agent_id": body.agent_id,
            "session_id": body.session_id,
        }))
        .into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

pub async fn post_registry_entry(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PostRegistryEntry>,
) -> ApiResult<Json<AgentRegistryEntry>> {
    Ok(Json(state.registry.upsert(input).await?))
}

pub async fn list_registry(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<AgentRegistryEntry>>> {
    Ok(Json(state.registry.list().await?))
}

pub async fn get_registry_entry(
    State(state): State<Arc<AppState>>,
    Path(agent_type): Path<String>,
) -> ApiResult<Json<AgentRegistryEntry>> {
    Ok(Json(state.registry.get(&agent_type).await?))
}

pub async fn delete_registry_entry(
    State(state): State<Arc<AppState>>,
    Path(agent_type): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.registry.delete(&agent_type).await?;
    Ok(Json(serde_json::json!({ "deleted": agent_type })))
}

pub async fn cleanup_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<CleanupStats>> {
    Ok(Json(state.cleanup.latest_stats().await))
}

pub async fn run_cleanup(State(state): State<Arc<AppState>>) -> ApiResult<Json<CleanupStats>> {
    Ok(Json(state.cleanup.run_once().await))
}

/// Dashboard KPIs: the metrics aggregate plus session stats and per-table
/// row counts.
pub async fn dashboard(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let metrics = state.metrics.snapshot().await?;
    let sessions = state.sessions.stats().await?;
    let tables = state.metrics.table_stats().await?;
    Ok(Json(serde_json::json!({
        "metrics": metrics,
        "sessions": sessions,
        "tables": tables,
    })))
}

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let latency_ms = postgres::ping(&state.pool)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "db_latency_ms": latency_ms,
    })))
}
