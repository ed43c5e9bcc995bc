//! Message repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentMessage, BusEvent, MessageTopic};

/// Filter criteria for message queries.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    pub topic: Option<MessageTopic>,
    pub since: Option<DateTime<Utc>>,
    pub include_broadcasts: bool,
    pub limit: i64,
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self {
            topic: None,
            since: None,
            include_broadcasts: true,
            limit: 100,
        }
    }
}

/// Repository interface for AgentMessage persistence.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: &AgentMessage, events: &[BusEvent]) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<AgentMessage>>;

    /// Messages visible to the agent (direct or broadcast) that are still
    /// live, newest first.
    async fn visible_to(
        &self,
        agent_id: &str,
        filter: MessageFilter,
    ) -> DomainResult<Vec<AgentMessage>>;

    /// Insert the agent into `read_by` if absent. Returns true when the
    /// agent was newly added; `events` are emitted only in that case.
    async fn mark_read(
        &self,
        message_id: Uuid,
        agent_id: &str,
        events: &[BusEvent],
    ) -> DomainResult<bool>;

    /// Delete rows whose TTL has lapsed; returns the count removed. Emits
    /// one aggregate `message.expired` event when anything was removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> DomainResult<u64>;

    /// Delete broadcast messages that have been read by at least one agent
    /// and are older than the cutoff; returns the count removed.
    async fn delete_read_broadcasts(&self, cutoff: DateTime<Utc>) -> DomainResult<u64>;
}
