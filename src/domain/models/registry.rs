//! Agent catalog entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog row describing one agent type: what it may touch, which waves it
/// participates in, and the model recommended to run it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistryEntry {
    pub id: Uuid,
    pub agent_type: String,
    pub category: Option<String>,
    pub allowed_tools: Vec<String>,
    pub forbidden_actions: Vec<String>,
    pub max_files: Option<i32>,
    pub wave_assignments: Vec<i32>,
    pub recommended_model: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AgentRegistryEntry {
    pub fn new(agent_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_type: agent_type.into(),
            category: None,
            allowed_tools: Vec::new(),
            forbidden_actions: Vec::new(),
            max_files: None,
            wave_assignments: Vec::new(),
            recommended_model: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_tool_allowed(&self, tool: &str) -> bool {
        self.allowed_tools.is_empty() || self.allowed_tools.iter().any(|t| t == tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allowlist_permits_everything() {
        let entry = AgentRegistryEntry::new("backend");
        assert!(entry.is_tool_allowed("bash"));
    }

    #[test]
    fn allowlist_restricts_tools() {
        let mut entry = AgentRegistryEntry::new("frontend");
        entry.allowed_tools = vec!["edit".into(), "read".into()];
        assert!(entry.is_tool_allowed("edit"));
        assert!(!entry.is_tool_allowed("bash"));
    }
}
