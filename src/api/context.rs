//! Context brief and compact snapshot endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::domain::models::AgentContext;
use crate::services::{GenerateContext, SaveSnapshot};

pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(input): Json<GenerateContext>,
) -> ApiResult<Json<AgentContext>> {
    Ok(Json(state.contexts.generate(input).await?))
}

pub async fn brief(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    Ok(Json(state.contexts.brief(&agent_id).await?))
}

pub async fn save_snapshot(
    State(state): State<Arc<AppState>>,
    Json(input): Json<SaveSnapshot>,
) -> ApiResult<Json<AgentContext>> {
    Ok(Json(state.contexts.save_snapshot(input).await?))
}

#[derive(Deserialize)]
pub struct RestoreBody {
    session_id: String,
}

pub async fn restore_snapshot(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RestoreBody>,
) -> ApiResult<Json<AgentContext>> {
    Ok(Json(state.contexts.restore_snapshot(&body.session_id).await?))
}

pub async fn snapshot_status(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(state.contexts.snapshot_status(&session_id).await?))
}

pub async fn get_snapshot(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<AgentContext>> {
    Ok(Json(state.contexts.get_snapshot(&session_id).await?))
}
