//! Blocking repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentBlocking, BusEvent};

/// Repository interface for agent blocking rows.
#[async_trait]
pub trait BlockingRepository: Send + Sync {
    /// The open row for the pair, if one exists.
    async fn find_open(
        &self,
        blocker: &str,
        blocked: &str,
    ) -> DomainResult<Option<AgentBlocking>>;

    async fn create(&self, blocking: &AgentBlocking, events: &[BusEvent]) -> DomainResult<()>;

    /// Resolve every open row for the pair; returns the count resolved.
    async fn resolve_pair(
        &self,
        blocker: &str,
        blocked: &str,
        events: &[BusEvent],
    ) -> DomainResult<u64>;

    /// True iff any open blocking names this agent as blocked.
    async fn any_open_for(&self, blocked: &str) -> DomainResult<bool>;

    async fn list_open(&self, agent_id: &str) -> DomainResult<Vec<AgentBlocking>>;
}
