//! Inter-agent message service.
//!
//! Messages carry priority and TTL semantics: priority 0..=10 (default 0),
//! TTL 1..=86400 seconds (default one hour). Broadcasts (`to_agent` absent)
//! publish on `global` only; direct messages also land on the recipient's
//! private channel.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentMessage, BusEvent, EventName, MessageTopic, MessageView, MAX_MESSAGE_PRIORITY,
    MAX_MESSAGE_TTL_SECONDS, MIN_MESSAGE_PRIORITY, MIN_MESSAGE_TTL_SECONDS,
};
use crate::domain::ports::{MessageFilter, MessageRepository};
use crate::gateway::channels::{Channel, GLOBAL_CHANNEL};
use crate::services::token_service::validate_agent_id;

/// Input for posting a message.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PostMessage {
    pub from_agent: String,
    pub to_agent: Option<String>,
    pub topic: String,
    pub content: serde_json::Value,
    pub priority: Option<i32>,
    pub ttl_seconds: Option<i64>,
}

pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    default_ttl_seconds: i64,
}

impl MessageService {
    pub fn new(messages: Arc<dyn MessageRepository>, default_ttl_seconds: i64) -> Self {
        Self {
            messages,
            default_ttl_seconds,
        }
    }

    pub async fn post_message(&self, input: PostMessage) -> DomainResult<AgentMessage> {
        validate_agent_id(&input.from_agent)?;
        if let Some(to_agent) = &input.to_agent {
            validate_agent_id(to_agent)?;
        }

        let topic = MessageTopic::from_str(&input.topic).ok_or_else(|| {
            DomainError::validation("topic", format!("unknown topic: {}", input.topic))
        })?;

        let priority = input.priority.unwrap_or(MIN_MESSAGE_PRIORITY);
        if !(MIN_MESSAGE_PRIORITY..=MAX_MESSAGE_PRIORITY).contains(&priority) {
            return Err(DomainError::validation(
                "priority",
                format!("must be between {MIN_MESSAGE_PRIORITY} and {MAX_MESSAGE_PRIORITY}"),
            ));
        }

        let ttl = input.ttl_seconds.unwrap_or(self.default_ttl_seconds);
        if !(MIN_MESSAGE_TTL_SECONDS..=MAX_MESSAGE_TTL_SECONDS).contains(&ttl) {
            return Err(DomainError::validation(
                "ttl_seconds",
                format!("must be between {MIN_MESSAGE_TTL_SECONDS} and {MAX_MESSAGE_TTL_SECONDS}"),
            ));
        }

        // Non-object content is wrapped so consumers always see a map.
        let content = if input.content.is_object() {
            input.content
        } else {
            serde_json::json!({ "message": input.content.to_string() })
        };

        let now = Utc::now();
        let message = AgentMessage {
            id: Uuid::new_v4(),
            from_agent: input.from_agent,
            to_agent: input.to_agent,
            topic,
            content,
            priority,
            read_by: Vec::new(),
            created_at: now,
            expires_at: Some(now + Duration::seconds(ttl)),
        };

        let data = serde_json::to_value(&message)?;
        let mut events = vec![BusEvent::new(GLOBAL_CHANNEL, EventName::MessageNew, data.clone())];
        if let Some(to_agent) = &message.to_agent {
            events.push(BusEvent::new(
                Channel::agent(to_agent),
                EventName::MessageNew,
                data,
            ));
        }

        self.messages.create(&message, &events).await?;
        Ok(message)
    }

    /// Messages visible to the agent, each tagged with `already_read` and
    /// `is_broadcast` relative to the reader.
    pub async fn get_messages(
        &self,
        agent_id: &str,
        filter: MessageFilter,
    ) -> DomainResult<Vec<MessageView>> {
        validate_agent_id(agent_id)?;
        let messages = self.messages.visible_to(agent_id, filter).await?;
        Ok(messages
            .into_iter()
            .map(|message| MessageView {
                already_read: message.is_read_by(agent_id),
                is_broadcast: message.is_broadcast(),
                message,
            })
            .collect())
    }

    /// Idempotent: only the first read by a given agent mutates `read_by`
    /// and emits `message.read`.
    pub async fn mark_read(&self, agent_id: &str, message_id: Uuid) -> DomainResult<bool> {
        validate_agent_id(agent_id)?;
        let events = [BusEvent::new(
            GLOBAL_CHANNEL,
            EventName::MessageRead,
            serde_json::json!({ "message_id": message_id, "agent_id": agent_id }),
        )];
        self.messages.mark_read(message_id, agent_id, &events).await
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<AgentMessage> {
        self.messages
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("message", id))
    }
}
