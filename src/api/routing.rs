//! Routing engine endpoints.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::domain::models::{RoutingFeedback, RoutingStats, SuggestFilters, ToolSuggestion};

#[derive(Deserialize)]
pub struct SuggestQuery {
    keywords: String,
    include_types: Option<String>,
    exclude_types: Option<String>,
    min_score: Option<f64>,
    limit: Option<usize>,
}

pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SuggestQuery>,
) -> ApiResult<Json<Vec<ToolSuggestion>>> {
    let filters = SuggestFilters {
        include_types: split_csv(query.include_types.as_deref()),
        exclude_types: split_csv(query.exclude_types.as_deref()),
        min_score: query.min_score,
        limit: query.limit,
    };
    Ok(Json(state.routing.suggest(&query.keywords, filters).await?))
}

pub async fn feedback(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RoutingFeedback>,
) -> ApiResult<Json<serde_json::Value>> {
    state.routing.feedback(input).await?;
    Ok(Json(serde_json::json!({ "recorded": true })))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<RoutingStats>> {
    Ok(Json(state.routing.stats().await?))
}

fn split_csv(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
