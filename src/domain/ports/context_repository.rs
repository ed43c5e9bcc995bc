//! Agent context repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentContext, BusEvent};

/// Repository interface for AgentContext persistence, including compact
/// snapshots (contexts with the reserved snapshot agent type).
#[async_trait]
pub trait ContextRepository: Send + Sync {
    /// Insert or replace the row for `(project_id, agent_id)`.
    async fn upsert(&self, context: &AgentContext, events: &[BusEvent]) -> DomainResult<AgentContext>;

    async fn get(&self, project_id: Uuid, agent_id: &str) -> DomainResult<Option<AgentContext>>;

    async fn list_by_agent(&self, agent_id: &str) -> DomainResult<Vec<AgentContext>>;

    /// Latest compact snapshot for a session, if any.
    async fn latest_snapshot(&self, session_id: &str) -> DomainResult<Option<AgentContext>>;

    /// Delete stale non-snapshot contexts: role status in
    /// {running, paused, blocked, null}, last updated before the cutoff,
    /// and no matching recent subtask activity. Returns the count removed.
    async fn delete_stale(
        &self,
        updated_before: DateTime<Utc>,
        active_since: DateTime<Utc>,
    ) -> DomainResult<u64>;

    /// Delete compact snapshots older than the cutoff; returns the count.
    async fn delete_old_snapshots(&self, updated_before: DateTime<Utc>) -> DomainResult<u64>;
}
