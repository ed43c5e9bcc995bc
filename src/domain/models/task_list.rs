//! Task-list (wave) domain model.
//!
//! A task-list is an ordered group of subtasks within a request, identified
//! by a non-negative wave number. Wave 0 runs first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskListStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl Default for TaskListStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskListStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// An ordered group of subtasks within a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskList {
    pub id: Uuid,
    pub request_id: Uuid,
    /// Position in the wave ordering; 0 is the first wave.
    pub wave_number: i32,
    pub status: TaskListStatus,
    pub created_at: DateTime<Utc>,
}

impl TaskList {
    pub fn new(request_id: Uuid, wave_number: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            wave_number,
            status: TaskListStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [
            TaskListStatus::Pending,
            TaskListStatus::Running,
            TaskListStatus::Completed,
            TaskListStatus::Failed,
        ] {
            assert_eq!(TaskListStatus::from_str(status.as_str()), Some(status));
        }
    }
}
