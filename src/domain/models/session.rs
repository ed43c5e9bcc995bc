//! Session domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A coordination session. The identifier is an opaque string supplied by
/// the caller; a session ends when explicitly closed or when cleanup deems
/// it orphaned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub request_count: i64,
    pub subtask_count: i64,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            started_at: Utc::now(),
            ended_at: None,
            request_count: 0,
            subtask_count: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Aggregate session statistics for the dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: i64,
    pub active_sessions: i64,
    pub total_requests: i64,
    pub total_subtasks: i64,
    pub completed_subtasks: i64,
    pub failed_subtasks: i64,
}

/// One currently-active agent, derived from running subtasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveAgent {
    pub agent_id: String,
    pub agent_type: Option<String>,
    pub session_id: String,
    pub running_subtasks: i64,
    pub last_action_at: Option<DateTime<Utc>>,
}
