//! Action recording service.
//!
//! Records tool invocations with compressed opaque blobs, appends token
//! accounting, and keeps the per-agent capacity gauge current.

use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Action, AgentCapacity, BusEvent, CapacityZone, EventName, HourlyActionCount,
    TokenConsumption, ToolKind,
};
use crate::domain::ports::{ActionRepository, CapacityRepository, SubtaskRepository};
use crate::gateway::channels::{Channel, GLOBAL_CHANNEL};
use crate::services::token_service::validate_agent_id;

/// Default rolling token budget for agents first seen via usage recording.
const DEFAULT_MAX_CAPACITY: i64 = 200_000;

/// Input for recording an action.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PostAction {
    pub subtask_id: Uuid,
    pub tool_name: String,
    pub tool_kind: ToolKind,
    pub input: Option<serde_json::Value>,
    pub output: Option<serde_json::Value>,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub file_paths: Vec<String>,
    pub agent_id: Option<String>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
}

pub struct ActionService {
    actions: Arc<dyn ActionRepository>,
    subtasks: Arc<dyn SubtaskRepository>,
    capacity: Arc<dyn CapacityRepository>,
}

impl ActionService {
    pub fn new(
        actions: Arc<dyn ActionRepository>,
        subtasks: Arc<dyn SubtaskRepository>,
        capacity: Arc<dyn CapacityRepository>,
    ) -> Self {
        Self {
            actions,
            subtasks,
            capacity,
        }
    }

    pub async fn record(&self, input: PostAction) -> DomainResult<Action> {
        if input.tool_name.trim().is_empty() {
            return Err(DomainError::validation("tool_name", "must not be empty"));
        }
        if self.subtasks.get(input.subtask_id).await?.is_none() {
            return Err(DomainError::not_found("subtask", input.subtask_id));
        }

        let mut action = Action::new(input.subtask_id, input.tool_name, input.tool_kind);
        action.input = input.input.as_ref().map(compress_json).transpose()?;
        action.output = input.output.as_ref().map(compress_json).transpose()?;
        action.exit_code = input.exit_code;
        action.duration_ms = input.duration_ms;
        action.file_paths = input.file_paths;

        let data = serde_json::json!({
            "id": action.id,
            "subtask_id": action.subtask_id,
            "tool_name": action.tool_name,
            "tool_kind": action.tool_kind.as_str(),
            "duration_ms": action.duration_ms,
        });
        let events = [BusEvent::new(GLOBAL_CHANNEL, EventName::SubtaskUpdated, data)];
        self.actions.create(&action, &events).await?;

        // Token accounting and the capacity gauge ride along when the
        // caller identifies the acting agent.
        if let Some(agent_id) = input.agent_id {
            validate_agent_id(&agent_id)?;
            let tokens_in = input.input_tokens.unwrap_or(0);
            let tokens_out = input.output_tokens.unwrap_or(0);
            if tokens_in > 0 || tokens_out > 0 {
                self.actions
                    .record_tokens(&TokenConsumption {
                        id: Uuid::new_v4(),
                        agent_id: agent_id.clone(),
                        session_id: None,
                        action_id: Some(action.id),
                        input_tokens: tokens_in,
                        output_tokens: tokens_out,
                        created_at: Utc::now(),
                    })
                    .await?;
                self.record_usage(&agent_id, tokens_in + tokens_out).await?;
            }
        }

        Ok(action)
    }

    /// Apply token usage to the agent's gauge; crossing into critical fires
    /// a warning event once.
    pub async fn record_usage(&self, agent_id: &str, tokens: i64) -> DomainResult<AgentCapacity> {
        let mut capacity = match self.capacity.get(agent_id).await? {
            Some(capacity) => capacity,
            None => AgentCapacity::new(agent_id, DEFAULT_MAX_CAPACITY),
        };

        let now = Utc::now();
        let crossed_critical = capacity.record_usage(tokens, now);

        let mut events = Vec::new();
        if crossed_critical {
            let data = serde_json::json!({
                "message": "agent capacity critical",
                "agent_id": agent_id,
                "current_usage": capacity.current_usage,
                "max_capacity": capacity.max_capacity,
                "zone": CapacityZone::Critical.as_str(),
            });
            events.push(BusEvent::new(GLOBAL_CHANNEL, EventName::SystemError, data.clone()));
            events.push(BusEvent::new(Channel::agent(agent_id), EventName::SystemError, data));
        }
        self.capacity.upsert(&capacity, &events).await?;
        Ok(capacity)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Action> {
        self.actions
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("action", id))
    }

    pub async fn list_by_subtask(&self, subtask_id: Uuid, limit: i64) -> DomainResult<Vec<Action>> {
        self.actions.list_by_subtask(subtask_id, limit).await
    }

    pub async fn hourly(&self, hours_back: i64) -> DomainResult<Vec<HourlyActionCount>> {
        let since = Utc::now() - chrono::Duration::hours(hours_back.max(1));
        self.actions.hourly(since).await
    }

    pub async fn capacity_of(&self, agent_id: &str) -> DomainResult<Option<AgentCapacity>> {
        self.capacity.get(agent_id).await
    }

    pub async fn list_capacity(&self) -> DomainResult<Vec<AgentCapacity>> {
        self.capacity.list().await
    }
}

/// Gzip-compress a JSON value into an opaque blob.
pub fn compress_json(value: &serde_json::Value) -> DomainResult<Vec<u8>> {
    let raw = serde_json::to_vec(value)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .and_then(|()| encoder.finish())
        .map_err(|e| DomainError::Serialization(format!("gzip failed: {e}")))
}

/// Inverse of [`compress_json`]; used by readers that own the blob format.
pub fn decompress_json(blob: &[u8]) -> DomainResult<serde_json::Value> {
    let mut decoder = GzDecoder::new(blob);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| DomainError::Serialization(format!("gunzip failed: {e}")))?;
    Ok(serde_json::from_slice(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trips_through_gzip() {
        let value = serde_json::json!({ "cmd": "cargo check", "args": ["--all"] });
        let blob = compress_json(&value).unwrap();
        assert_ne!(blob, serde_json::to_vec(&value).unwrap());
        assert_eq!(decompress_json(&blob).unwrap(), value);
    }

    #[test]
    fn garbage_blob_is_rejected() {
        assert!(decompress_json(b"not gzip at all").is_err());
    }
}
