//! Wave controller endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::domain::models::{OrchestrationBatch, WaveState};

#[derive(Deserialize)]
pub struct WaveBody {
    wave_number: i32,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(body): Json<WaveBody>,
) -> ApiResult<Json<WaveState>> {
    Ok(Json(
        state
            .waves
            .get_or_create_wave(&session_id, body.wave_number)
            .await?,
    ))
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(body): Json<WaveBody>,
) -> ApiResult<Json<WaveState>> {
    Ok(Json(
        state.waves.start_wave(&session_id, body.wave_number).await?,
    ))
}

pub async fn transition(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Option<WaveState>>> {
    Ok(Json(state.waves.transition_to_next_wave(&session_id).await?))
}

pub async fn current(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Option<WaveState>>> {
    Ok(Json(state.waves.get_current_wave(&session_id).await?))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<WaveState>>> {
    Ok(Json(state.waves.get_wave_history(&session_id).await?))
}

pub async fn batches(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<OrchestrationBatch>>> {
    Ok(Json(state.waves.get_batches(&session_id).await?))
}
