//! Durable topic subscription service.

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::TopicSubscription;
use crate::domain::ports::SubscriptionRepository;
use crate::gateway::channels::Channel;
use crate::services::token_service::validate_agent_id;

pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl SubscriptionService {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>) -> Self {
        Self { subscriptions }
    }

    /// Persist a channel interest; idempotent per (agent, channel).
    pub async fn subscribe(&self, agent_id: &str, channel: &str) -> DomainResult<TopicSubscription> {
        validate_agent_id(agent_id)?;
        if Channel::parse(channel).is_none() {
            return Err(DomainError::validation(
                "channel",
                format!("invalid channel: {channel}"),
            ));
        }
        self.subscriptions.add(agent_id, channel).await
    }

    pub async fn unsubscribe(&self, agent_id: &str, channel: &str) -> DomainResult<u64> {
        validate_agent_id(agent_id)?;
        self.subscriptions.remove(agent_id, channel).await
    }

    pub async fn list(&self, agent_id: &str) -> DomainResult<Vec<TopicSubscription>> {
        validate_agent_id(agent_id)?;
        self.subscriptions.list_for_agent(agent_id).await
    }
}
