//! Action domain model.
//!
//! An action is a single tool invocation recorded against a subtask. Input
//! and output are opaque compressed blobs; readers must not assume a text
//! encoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of tool an action invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Builtin,
    Agent,
    Skill,
    Command,
    Mcp,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::Agent => "agent",
            Self::Skill => "skill",
            Self::Command => "command",
            Self::Mcp => "mcp",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "builtin" => Some(Self::Builtin),
            "agent" => Some(Self::Agent),
            "skill" => Some(Self::Skill),
            "command" => Some(Self::Command),
            "mcp" => Some(Self::Mcp),
            _ => None,
        }
    }
}

/// A single tool invocation recorded as part of a subtask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub subtask_id: Uuid,
    pub tool_name: String,
    pub tool_kind: ToolKind,
    /// Compressed opaque input blob.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Vec<u8>>,
    /// Compressed opaque output blob.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<u8>>,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<i64>,
    /// File paths touched by this invocation.
    pub file_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Action {
    pub fn new(subtask_id: Uuid, tool_name: impl Into<String>, tool_kind: ToolKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            subtask_id,
            tool_name: tool_name.into(),
            tool_kind,
            input: None,
            output: None,
            exit_code: None,
            duration_ms: None,
            file_paths: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only per-action token accounting row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConsumption {
    pub id: Uuid,
    pub agent_id: String,
    pub session_id: Option<String>,
    pub action_id: Option<Uuid>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub created_at: DateTime<Utc>,
}

/// One bucket of the hourly action histogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyActionCount {
    pub hour: DateTime<Utc>,
    pub count: i64,
    pub avg_duration_ms: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_kind_round_trips() {
        for kind in [
            ToolKind::Builtin,
            ToolKind::Agent,
            ToolKind::Skill,
            ToolKind::Command,
            ToolKind::Mcp,
        ] {
            assert_eq!(ToolKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ToolKind::from_str("webhook"), None);
    }
}
