//! Task-list and subtask endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::domain::models::{Subtask, SubtaskStatus, TaskList, TaskListStatus};
use crate::domain::ports::SubtaskFilter;
use crate::services::{PatchSubtask, PostSubtask, PostTaskList};

pub async fn post_task_list(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PostTaskList>,
) -> ApiResult<Json<TaskList>> {
    Ok(Json(state.task_lists.create(input).await?))
}

pub async fn get_task_list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskList>> {
    Ok(Json(state.task_lists.get(id).await?))
}

#[derive(Deserialize)]
pub struct PatchTaskListBody {
    status: TaskListStatus,
}

pub async fn patch_task_list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<PatchTaskListBody>,
) -> ApiResult<Json<TaskList>> {
    Ok(Json(state.task_lists.update_status(id, body.status).await?))
}

pub async fn delete_task_list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.task_lists.delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

pub async fn list_request_task_lists(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<TaskList>>> {
    Ok(Json(state.task_lists.list_by_request(id).await?))
}

pub async fn post_subtask(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PostSubtask>,
) -> ApiResult<Json<Subtask>> {
    Ok(Json(state.subtasks.create(input).await?))
}

#[derive(Deserialize)]
pub struct SubtaskListQuery {
    task_list_id: Option<Uuid>,
    status: Option<String>,
    agent_type: Option<String>,
    parent_agent: Option<String>,
    since: Option<DateTime<Utc>>,
    limit: Option<i64>,
}

pub async fn list_subtasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubtaskListQuery>,
) -> ApiResult<Json<Vec<Subtask>>> {
    let filter = SubtaskFilter {
        task_list_id: query.task_list_id,
        status: query.status.as_deref().and_then(SubtaskStatus::from_str),
        agent_type: query.agent_type,
        parent_agent: query.parent_agent,
        since: query.since,
        limit: query.limit,
    };
    Ok(Json(state.subtasks.list(filter).await?))
}

pub async fn get_subtask(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Subtask>> {
    Ok(Json(state.subtasks.get(id).await?))
}

pub async fn patch_subtask(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<PatchSubtask>,
) -> ApiResult<Json<Subtask>> {
    Ok(Json(state.subtasks.patch_status(id, patch).await?))
}

pub async fn delete_subtask(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.subtasks.delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(Deserialize)]
pub struct CloseSessionBody {
    session_id: String,
}

pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CloseSessionBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let failed = state.subtasks.close_session_subtasks(&body.session_id).await?;
    Ok(Json(serde_json::json!({
        "session_id": body.session_id,
        "failed_subtasks": failed.len(),
    })))
}
