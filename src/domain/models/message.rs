//! Inter-agent message domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inclusive priority bounds for agent messages.
pub const MIN_MESSAGE_PRIORITY: i32 = 0;
pub const MAX_MESSAGE_PRIORITY: i32 = 10;

/// TTL bounds in seconds.
pub const MIN_MESSAGE_TTL_SECONDS: i64 = 1;
pub const MAX_MESSAGE_TTL_SECONDS: i64 = 86_400;
pub const DEFAULT_MESSAGE_TTL_SECONDS: i64 = 3_600;

/// Enumerated classification for agent messages.
///
/// Any topic outside this set is rejected at the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageTopic {
    #[serde(rename = "task.created")]
    TaskCreated,
    #[serde(rename = "task.completed")]
    TaskCompleted,
    #[serde(rename = "task.failed")]
    TaskFailed,
    #[serde(rename = "context.request")]
    ContextRequest,
    #[serde(rename = "context.response")]
    ContextResponse,
    #[serde(rename = "alert.blocking")]
    AlertBlocking,
    #[serde(rename = "agent.heartbeat")]
    AgentHeartbeat,
    #[serde(rename = "agent.started")]
    AgentStarted,
    #[serde(rename = "agent.completed")]
    AgentCompleted,
    #[serde(rename = "workflow.progress")]
    WorkflowProgress,
}

impl MessageTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskCreated => "task.created",
            Self::TaskCompleted => "task.completed",
            Self::TaskFailed => "task.failed",
            Self::ContextRequest => "context.request",
            Self::ContextResponse => "context.response",
            Self::AlertBlocking => "alert.blocking",
            Self::AgentHeartbeat => "agent.heartbeat",
            Self::AgentStarted => "agent.started",
            Self::AgentCompleted => "agent.completed",
            Self::WorkflowProgress => "workflow.progress",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "task.created" => Some(Self::TaskCreated),
            "task.completed" => Some(Self::TaskCompleted),
            "task.failed" => Some(Self::TaskFailed),
            "context.request" => Some(Self::ContextRequest),
            "context.response" => Some(Self::ContextResponse),
            "alert.blocking" => Some(Self::AlertBlocking),
            "agent.heartbeat" => Some(Self::AgentHeartbeat),
            "agent.started" => Some(Self::AgentStarted),
            "agent.completed" => Some(Self::AgentCompleted),
            "workflow.progress" => Some(Self::WorkflowProgress),
            _ => None,
        }
    }

    pub fn all() -> &'static [MessageTopic] {
        &[
            Self::TaskCreated,
            Self::TaskCompleted,
            Self::TaskFailed,
            Self::ContextRequest,
            Self::ContextResponse,
            Self::AlertBlocking,
            Self::AgentHeartbeat,
            Self::AgentStarted,
            Self::AgentCompleted,
            Self::WorkflowProgress,
        ]
    }
}

/// An inter-agent payload with priority and TTL semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: Uuid,
    pub from_agent: String,
    /// `None` means broadcast: visible to every agent.
    pub to_agent: Option<String>,
    pub topic: MessageTopic,
    pub content: serde_json::Value,
    pub priority: i32,
    /// Agent ids that have read this message.
    pub read_by: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AgentMessage {
    /// Whether this message is visible to `agent_id` (direct or broadcast).
    pub fn is_visible_to(&self, agent_id: &str) -> bool {
        match &self.to_agent {
            Some(to) => to == agent_id,
            None => true,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.to_agent.is_none()
    }

    /// Live iff `expires_at` is absent or in the future.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }

    pub fn is_read_by(&self, agent_id: &str) -> bool {
        self.read_by.iter().any(|a| a == agent_id)
    }
}

/// A message as seen by one agent: the row plus reader-relative tags.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: AgentMessage,
    pub already_read: bool,
    pub is_broadcast: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn message(to: Option<&str>) -> AgentMessage {
        AgentMessage {
            id: Uuid::new_v4(),
            from_agent: "a".into(),
            to_agent: to.map(String::from),
            topic: MessageTopic::TaskCompleted,
            content: serde_json::json!({"ok": true}),
            priority: 0,
            read_by: Vec::new(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn every_topic_round_trips() {
        for topic in MessageTopic::all() {
            assert_eq!(MessageTopic::from_str(topic.as_str()), Some(*topic));
        }
        assert_eq!(MessageTopic::from_str("task.exploded"), None);
    }

    #[test]
    fn direct_message_visibility() {
        let msg = message(Some("b"));
        assert!(msg.is_visible_to("b"));
        assert!(!msg.is_visible_to("c"));
        assert!(!msg.is_broadcast());
    }

    #[test]
    fn broadcast_visible_to_everyone() {
        let msg = message(None);
        assert!(msg.is_visible_to("anyone"));
        assert!(msg.is_broadcast());
    }

    #[test]
    fn liveness_follows_expiry() {
        let now = Utc::now();
        let mut msg = message(None);
        assert!(msg.is_live(now));
        msg.expires_at = Some(now - Duration::seconds(1));
        assert!(!msg.is_live(now));
        msg.expires_at = Some(now + Duration::seconds(1));
        assert!(msg.is_live(now));
    }
}
