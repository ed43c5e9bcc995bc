//! Subscription repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::TopicSubscription;

/// Repository interface for durable topic subscriptions.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Idempotent: re-adding an existing (agent, channel) pair is a no-op.
    async fn add(&self, agent_id: &str, channel: &str) -> DomainResult<TopicSubscription>;

    async fn remove(&self, agent_id: &str, channel: &str) -> DomainResult<u64>;

    async fn list_for_agent(&self, agent_id: &str) -> DomainResult<Vec<TopicSubscription>>;
}
