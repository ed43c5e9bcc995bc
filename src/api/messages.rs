//! Message, blocking, and subscription endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::domain::models::{
    AgentBlocking, AgentMessage, MessageTopic, MessageView, TopicSubscription,
};
use crate::domain::ports::MessageFilter;
use crate::services::PostMessage;

pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PostMessage>,
) -> ApiResult<Json<AgentMessage>> {
    Ok(Json(state.messages.post_message(input).await?))
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    topic: Option<String>,
    since: Option<DateTime<Utc>>,
    include_broadcasts: Option<bool>,
    limit: Option<i64>,
}

pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<Vec<MessageView>>> {
    let filter = MessageFilter {
        topic: query.topic.as_deref().and_then(MessageTopic::from_str),
        since: query.since,
        include_broadcasts: query.include_broadcasts.unwrap_or(true),
        limit: query.limit.unwrap_or(100),
    };
    Ok(Json(state.messages.get_messages(&agent_id, filter).await?))
}

#[derive(Deserialize)]
pub struct MarkReadBody {
    agent_id: String,
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<MarkReadBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let newly_read = state.messages.mark_read(&body.agent_id, id).await?;
    Ok(Json(serde_json::json!({
        "message_id": id,
        "agent_id": body.agent_id,
        "newly_read": newly_read,
    })))
}

#[derive(Deserialize)]
pub struct BlockBody {
    blocker: String,
    blocked: String,
    reason: Option<String>,
}

pub async fn block(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BlockBody>,
) -> ApiResult<Json<AgentBlocking>> {
    Ok(Json(
        state
            .blockings
            .block(&body.blocker, &body.blocked, body.reason)
            .await?,
    ))
}

#[derive(Deserialize)]
pub struct UnblockBody {
    blocker: String,
    blocked: String,
}

pub async fn unblock(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UnblockBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let resolved = state.blockings.unblock(&body.blocker, &body.blocked).await?;
    Ok(Json(serde_json::json!({ "resolved": resolved })))
}

pub async fn list_blockings(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Vec<AgentBlocking>>> {
    Ok(Json(state.blockings.list_open(&agent_id).await?))
}

pub async fn blocking_status(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let blocked = state.blockings.check_is_blocked(&agent_id).await?;
    Ok(Json(serde_json::json!({
        "agent_id": agent_id,
        "is_blocked": blocked,
    })))
}

#[derive(Deserialize)]
pub struct SubscriptionBody {
    agent_id: String,
    channel: String,
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubscriptionBody>,
) -> ApiResult<Json<TopicSubscription>> {
    Ok(Json(
        state
            .subscriptions
            .subscribe(&body.agent_id, &body.channel)
            .await?,
    ))
}

pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubscriptionBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = state
        .subscriptions
        .unsubscribe(&body.agent_id, &body.channel)
        .await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Vec<TopicSubscription>>> {
    Ok(Json(state.subscriptions.list(&agent_id).await?))
}
