//! Agent registry repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::AgentRegistryEntry;

/// Repository interface for the agent catalog.
#[async_trait]
pub trait RegistryRepository: Send + Sync {
    /// Insert or replace the row for the agent type.
    async fn upsert(&self, entry: &AgentRegistryEntry) -> DomainResult<AgentRegistryEntry>;

    async fn get_by_type(&self, agent_type: &str) -> DomainResult<Option<AgentRegistryEntry>>;

    async fn list(&self) -> DomainResult<Vec<AgentRegistryEntry>>;

    async fn delete(&self, agent_type: &str) -> DomainResult<u64>;
}
