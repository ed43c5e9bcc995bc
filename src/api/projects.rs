//! Project, request, and hierarchy endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::domain::errors::DomainError;
use crate::domain::models::{Project, Request, RequestStatus};
use crate::domain::ports::ProjectHierarchy;
use crate::services::{PostProject, PostRequest};

pub async fn post_project(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PostProject>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.projects.post_project(input).await?))
}

pub async fn list_projects(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.projects.list().await?))
}

#[derive(Deserialize)]
pub struct ByPathQuery {
    path: String,
}

pub async fn get_by_path(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ByPathQuery>,
) -> ApiResult<Json<Project>> {
    let project = state
        .projects
        .get_by_path(&query.path)
        .await?
        .ok_or_else(|| DomainError::not_found("project", &query.path))?;
    Ok(Json(project))
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.projects.get(id).await?))
}

pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.projects.delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

pub async fn hierarchy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectHierarchy>> {
    Ok(Json(state.projects.hierarchy(id).await?))
}

pub async fn post_request(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PostRequest>,
) -> ApiResult<Json<Request>> {
    Ok(Json(state.requests.create(input).await?))
}

pub async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Request>> {
    Ok(Json(state.requests.get(id).await?))
}

#[derive(Deserialize)]
pub struct PatchRequestBody {
    status: RequestStatus,
}

pub async fn patch_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<PatchRequestBody>,
) -> ApiResult<Json<Request>> {
    Ok(Json(state.requests.update_status(id, body.status).await?))
}

pub async fn list_project_requests(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Request>>> {
    Ok(Json(state.requests.list_by_project(id).await?))
}

pub async fn list_session_requests(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<Request>>> {
    Ok(Json(state.requests.list_by_session(&session_id).await?))
}
