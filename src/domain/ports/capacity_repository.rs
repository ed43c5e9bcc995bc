//! Capacity repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentCapacity, BusEvent};

/// Repository interface for agent capacity gauges.
#[async_trait]
pub trait CapacityRepository: Send + Sync {
    async fn get(&self, agent_id: &str) -> DomainResult<Option<AgentCapacity>>;

    async fn upsert(&self, capacity: &AgentCapacity, events: &[BusEvent]) -> DomainResult<()>;

    async fn list(&self) -> DomainResult<Vec<AgentCapacity>>;
}
