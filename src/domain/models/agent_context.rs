//! Durable per-agent role snapshots and compact snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Agent type reserved for compact snapshots. Rows with this type are
/// exempt from stale-context pruning and instead age out on their own
/// schedule.
pub const COMPACT_SNAPSHOT_AGENT_TYPE: &str = "compact-snapshot";

/// Durable per-agent role snapshot, unique per (project, agent-id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub id: Uuid,
    pub project_id: Uuid,
    pub agent_id: String,
    pub agent_type: Option<String>,
    /// Free-form role context; `role_context.status` mirrors the agent's
    /// lifecycle for cleanup purposes.
    pub role_context: serde_json::Value,
    pub last_updated: DateTime<Utc>,
}

impl AgentContext {
    pub fn new(project_id: Uuid, agent_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            agent_id: agent_id.into(),
            agent_type: None,
            role_context: serde_json::Value::Object(serde_json::Map::new()),
            last_updated: Utc::now(),
        }
    }

    pub fn is_compact_snapshot(&self) -> bool {
        self.agent_type.as_deref() == Some(COMPACT_SNAPSHOT_AGENT_TYPE)
    }

    /// The `status` field inside `role_context`, if present.
    pub fn role_status(&self) -> Option<&str> {
        self.role_context.get("status").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_snapshot_detection() {
        let mut ctx = AgentContext::new(Uuid::new_v4(), "agent-1");
        assert!(!ctx.is_compact_snapshot());
        ctx.agent_type = Some(COMPACT_SNAPSHOT_AGENT_TYPE.to_string());
        assert!(ctx.is_compact_snapshot());
    }

    #[test]
    fn role_status_reads_nested_field() {
        let mut ctx = AgentContext::new(Uuid::new_v4(), "agent-1");
        assert_eq!(ctx.role_status(), None);
        ctx.role_context = serde_json::json!({"status": "running", "files": []});
        assert_eq!(ctx.role_status(), Some("running"));
    }
}
