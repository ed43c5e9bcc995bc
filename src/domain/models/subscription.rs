//! Durable topic subscriptions.
//!
//! These persist an agent's logical channel interests independently of any
//! live gateway connection, so a reconnecting agent can be re-wired to its
//! channels on authentication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSubscription {
    pub id: Uuid,
    pub agent_id: String,
    pub channel: String,
    pub created_at: DateTime<Utc>,
}

impl TopicSubscription {
    pub fn new(agent_id: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            channel: channel.into(),
            created_at: Utc::now(),
        }
    }
}
