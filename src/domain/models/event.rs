//! Event names and the bus envelope.
//!
//! Every user-visible mutation emits a `{channel, event, data}` tuple inside
//! the same transaction as the write; the event bus relays committed tuples
//! onto the gateway's channel fabric.

use serde::{Deserialize, Serialize};

/// The enumerated set of event names. Publishing any name outside this set
/// is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    TaskCreated,
    TaskUpdated,
    TaskCompleted,
    TaskFailed,
    SubtaskCreated,
    SubtaskUpdated,
    SubtaskCompleted,
    SubtaskFailed,
    SubtaskRunning,
    MessageNew,
    MessageRead,
    MessageExpired,
    AgentConnected,
    AgentDisconnected,
    AgentHeartbeat,
    AgentBlocked,
    AgentUnblocked,
    SessionCreated,
    SessionEnded,
    WaveTransitioned,
    WaveCompleted,
    WaveFailed,
    MetricUpdate,
    SystemError,
    SystemInfo,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskCreated => "task.created",
            Self::TaskUpdated => "task.updated",
            Self::TaskCompleted => "task.completed",
            Self::TaskFailed => "task.failed",
            Self::SubtaskCreated => "subtask.created",
            Self::SubtaskUpdated => "subtask.updated",
            Self::SubtaskCompleted => "subtask.completed",
            Self::SubtaskFailed => "subtask.failed",
            Self::SubtaskRunning => "subtask.running",
            Self::MessageNew => "message.new",
            Self::MessageRead => "message.read",
            Self::MessageExpired => "message.expired",
            Self::AgentConnected => "agent.connected",
            Self::AgentDisconnected => "agent.disconnected",
            Self::AgentHeartbeat => "agent.heartbeat",
            Self::AgentBlocked => "agent.blocked",
            Self::AgentUnblocked => "agent.unblocked",
            Self::SessionCreated => "session.created",
            Self::SessionEnded => "session.ended",
            Self::WaveTransitioned => "wave.transitioned",
            Self::WaveCompleted => "wave.completed",
            Self::WaveFailed => "wave.failed",
            Self::MetricUpdate => "metric.update",
            Self::SystemError => "system.error",
            Self::SystemInfo => "system.info",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "task.created" => Some(Self::TaskCreated),
            "task.updated" => Some(Self::TaskUpdated),
            "task.completed" => Some(Self::TaskCompleted),
            "task.failed" => Some(Self::TaskFailed),
            "subtask.created" => Some(Self::SubtaskCreated),
            "subtask.updated" => Some(Self::SubtaskUpdated),
            "subtask.completed" => Some(Self::SubtaskCompleted),
            "subtask.failed" => Some(Self::SubtaskFailed),
            "subtask.running" => Some(Self::SubtaskRunning),
            "message.new" => Some(Self::MessageNew),
            "message.read" => Some(Self::MessageRead),
            "message.expired" => Some(Self::MessageExpired),
            "agent.connected" => Some(Self::AgentConnected),
            "agent.disconnected" => Some(Self::AgentDisconnected),
            "agent.heartbeat" => Some(Self::AgentHeartbeat),
            "agent.blocked" => Some(Self::AgentBlocked),
            "agent.unblocked" => Some(Self::AgentUnblocked),
            "session.created" => Some(Self::SessionCreated),
            "session.ended" => Some(Self::SessionEnded),
            "wave.transitioned" => Some(Self::WaveTransitioned),
            "wave.completed" => Some(Self::WaveCompleted),
            "wave.failed" => Some(Self::WaveFailed),
            "metric.update" => Some(Self::MetricUpdate),
            "system.error" => Some(Self::SystemError),
            "system.info" => Some(Self::SystemInfo),
            _ => None,
        }
    }

    /// Events in the task/subtask/message families are delivered
    /// at-least-once: the gateway tracks them in the pending-ack table.
    pub fn requires_ack(&self) -> bool {
        let name = self.as_str();
        name.starts_with("task.") || name.starts_with("subtask.") || name.starts_with("message.")
    }
}

impl Serialize for EventName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).ok_or_else(|| serde::de::Error::custom(format!("unknown event name: {s}")))
    }
}

/// The `{channel, event, data}` envelope carried by NOTIFY payloads and the
/// gateway's fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub channel: String,
    pub event: String,
    pub data: serde_json::Value,
}

impl BusEvent {
    pub fn new(channel: impl Into<String>, event: EventName, data: serde_json::Value) -> Self {
        Self {
            channel: channel.into(),
            event: event.as_str().to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_round_trips() {
        for name in [
            "task.created",
            "subtask.running",
            "message.expired",
            "agent.unblocked",
            "session.ended",
            "wave.transitioned",
            "metric.update",
            "system.info",
        ] {
            let parsed = EventName::from_str(name).expect(name);
            assert_eq!(parsed.as_str(), name);
        }
        assert_eq!(EventName::from_str("task.exploded"), None);
    }

    #[test]
    fn ack_tracking_covers_task_subtask_message_families() {
        assert!(EventName::TaskCompleted.requires_ack());
        assert!(EventName::SubtaskCreated.requires_ack());
        assert!(EventName::MessageNew.requires_ack());
        assert!(!EventName::AgentConnected.requires_ack());
        assert!(!EventName::WaveCompleted.requires_ack());
        assert!(!EventName::MetricUpdate.requires_ack());
    }

    #[test]
    fn bus_event_serializes_flat() {
        let event = BusEvent::new("global", EventName::MessageNew, serde_json::json!({"id": 1}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["channel"], "global");
        assert_eq!(json["event"], "message.new");
        assert_eq!(json["data"]["id"], 1);
    }
}
