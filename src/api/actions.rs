//! Action, session, and capacity endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::domain::errors::DomainError;
use crate::domain::models::{
    Action, ActiveAgent, AgentCapacity, HourlyActionCount, Session, SessionStats,
};
use crate::services::PostAction;

pub async fn post_action(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PostAction>,
) -> ApiResult<Json<Action>> {
    Ok(Json(state.actions.record(input).await?))
}

pub async fn get_action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Action>> {
    Ok(Json(state.actions.get(id).await?))
}

#[derive(Deserialize)]
pub struct SubtaskActionsQuery {
    limit: Option<i64>,
}

pub async fn list_subtask_actions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<SubtaskActionsQuery>,
) -> ApiResult<Json<Vec<Action>>> {
    Ok(Json(
        state
            .actions
            .list_by_subtask(id, query.limit.unwrap_or(100))
            .await?,
    ))
}

#[derive(Deserialize)]
pub struct HourlyQuery {
    hours: Option<i64>,
}

pub async fn hourly(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HourlyQuery>,
) -> ApiResult<Json<Vec<HourlyActionCount>>> {
    Ok(Json(state.actions.hourly(query.hours.unwrap_or(24)).await?))
}

#[derive(Deserialize)]
pub struct SessionListQuery {
    #[serde(default)]
    active: bool,
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionListQuery>,
) -> ApiResult<Json<Vec<Session>>> {
    Ok(Json(state.sessions.list(query.active).await?))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    Ok(Json(state.sessions.get(&id).await?))
}

pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    Ok(Json(state.sessions.end(&id).await?))
}

pub async fn session_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<SessionStats>> {
    Ok(Json(state.sessions.stats().await?))
}

pub async fn active_agents(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<ActiveAgent>>> {
    Ok(Json(state.sessions.active_agents().await?))
}

pub async fn list_capacity(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<AgentCapacity>>> {
    Ok(Json(state.actions.list_capacity().await?))
}

pub async fn get_capacity(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<AgentCapacity>> {
    let capacity = state
        .actions
        .capacity_of(&agent_id)
        .await?
        .ok_or_else(|| DomainError::not_found("agent_capacity", &agent_id))?;
    Ok(Json(capacity))
}
