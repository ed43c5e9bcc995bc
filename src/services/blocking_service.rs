//! Agent blocking service.

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentBlocking, BusEvent, EventName};
use crate::domain::ports::BlockingRepository;
use crate::gateway::channels::{Channel, GLOBAL_CHANNEL};
use crate::services::token_service::validate_agent_id;

pub struct BlockingService {
    blockings: Arc<dyn BlockingRepository>,
}

impl BlockingService {
    pub fn new(blockings: Arc<dyn BlockingRepository>) -> Self {
        Self { blockings }
    }

    /// Open a blocking for the pair unless one already exists. Returns the
    /// open row either way.
    pub async fn block(
        &self,
        blocker: &str,
        blocked: &str,
        reason: Option<String>,
    ) -> DomainResult<AgentBlocking> {
        validate_agent_id(blocker)?;
        validate_agent_id(blocked)?;

        if let Some(existing) = self.blockings.find_open(blocker, blocked).await? {
            return Ok(existing);
        }

        let mut blocking = AgentBlocking::new(blocker, blocked);
        blocking.reason = reason;

        let data = serde_json::to_value(&blocking)?;
        let events = [
            BusEvent::new(GLOBAL_CHANNEL, EventName::AgentBlocked, data.clone()),
            BusEvent::new(Channel::agent(blocker), EventName::AgentBlocked, data.clone()),
            BusEvent::new(Channel::agent(blocked), EventName::AgentBlocked, data),
        ];
        self.blockings.create(&blocking, &events).await?;
        Ok(blocking)
    }

    /// Close every open blocking for the pair; returns how many resolved.
    pub async fn unblock(&self, blocker: &str, blocked: &str) -> DomainResult<u64> {
        validate_agent_id(blocker)?;
        validate_agent_id(blocked)?;

        let data = serde_json::json!({ "blocker_agent": blocker, "blocked_agent": blocked });
        let events = [
            BusEvent::new(GLOBAL_CHANNEL, EventName::AgentUnblocked, data.clone()),
            BusEvent::new(Channel::agent(blocker), EventName::AgentUnblocked, data.clone()),
            BusEvent::new(Channel::agent(blocked), EventName::AgentUnblocked, data),
        ];
        self.blockings.resolve_pair(blocker, blocked, &events).await
    }

    /// True iff any open blocking names this agent as blocked.
    pub async fn check_is_blocked(&self, agent_id: &str) -> DomainResult<bool> {
        validate_agent_id(agent_id)?;
        self.blockings.any_open_for(agent_id).await
    }

    pub async fn list_open(&self, agent_id: &str) -> DomainResult<Vec<AgentBlocking>> {
        validate_agent_id(agent_id)?;
        self.blockings.list_open(agent_id).await
    }
}
