//! Agent blocking records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One agent blocking another. A pair has at most one open row at a time;
/// unblocking resolves every open row for the pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentBlocking {
    pub id: Uuid,
    pub blocker_agent: String,
    pub blocked_agent: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AgentBlocking {
    pub fn new(blocker: impl Into<String>, blocked: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            blocker_agent: blocker.into(),
            blocked_agent: blocked.into(),
            reason: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}
