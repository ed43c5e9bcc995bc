//! Agent catalog service.

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::AgentRegistryEntry;
use crate::domain::ports::RegistryRepository;

/// Input for a catalog upsert.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PostRegistryEntry {
    pub agent_type: String,
    pub category: Option<String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub forbidden_actions: Vec<String>,
    pub max_files: Option<i32>,
    #[serde(default)]
    pub wave_assignments: Vec<i32>,
    pub recommended_model: Option<String>,
}

pub struct RegistryService {
    registry: Arc<dyn RegistryRepository>,
}

impl RegistryService {
    pub fn new(registry: Arc<dyn RegistryRepository>) -> Self {
        Self { registry }
    }

    pub async fn upsert(&self, input: PostRegistryEntry) -> DomainResult<AgentRegistryEntry> {
        if input.agent_type.trim().is_empty() {
            return Err(DomainError::validation("agent_type", "must not be empty"));
        }
        if input.wave_assignments.iter().any(|w| *w < 0) {
            return Err(DomainError::validation(
                "wave_assignments",
                "wave numbers must be non-negative",
            ));
        }

        let mut entry = AgentRegistryEntry::new(input.agent_type);
        entry.category = input.category;
        entry.allowed_tools = input.allowed_tools;
        entry.forbidden_actions = input.forbidden_actions;
        entry.max_files = input.max_files;
        entry.wave_assignments = input.wave_assignments;
        entry.recommended_model = input.recommended_model;

        self.registry.upsert(&entry).await
    }

    pub async fn get(&self, agent_type: &str) -> DomainResult<AgentRegistryEntry> {
        self.registry
            .get_by_type(agent_type)
            .await?
            .ok_or_else(|| DomainError::not_found("agent_registry", agent_type))
    }

    pub async fn list(&self) -> DomainResult<Vec<AgentRegistryEntry>> {
        self.registry.list().await
    }

    pub async fn delete(&self, agent_type: &str) -> DomainResult<()> {
        if self.registry.delete(agent_type).await? == 0 {
            return Err(DomainError::not_found("agent_registry", agent_type));
        }
        Ok(())
    }
}
