//! Subtask domain model.
//!
//! Subtasks are the units of work agents execute. Each belongs to exactly
//! one task-list and carries its own status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default priority assigned when the caller does not specify one.
pub const DEFAULT_SUBTASK_PRIORITY: i32 = 5;

/// Status of a subtask in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    /// Defined but not yet picked up.
    Pending,
    /// Currently being executed by an agent.
    Running,
    /// Execution suspended by the agent.
    Paused,
    /// Waiting on `blocked_by` siblings to resolve.
    Blocked,
    /// Finished successfully. Terminal.
    Completed,
    /// Finished unsuccessfully. Terminal.
    Failed,
}

impl Default for SubtaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl SubtaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "blocked" => Some(Self::Blocked),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Statuses counted as "open" for bulk session closure.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Valid transitions from this status.
    ///
    /// `Pending -> Failed` covers bulk session closure, where subtasks that
    /// never started are failed along with everything else still open.
    pub fn valid_transitions(&self) -> &'static [SubtaskStatus] {
        match self {
            Self::Pending => &[Self::Running, Self::Failed],
            Self::Running => &[Self::Paused, Self::Blocked, Self::Completed, Self::Failed],
            Self::Paused => &[Self::Running, Self::Failed],
            Self::Blocked => &[Self::Running, Self::Failed],
            Self::Completed => &[],
            Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// A unit of work owned by a task-list and assigned to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub task_list_id: Uuid,
    pub description: String,
    pub status: SubtaskStatus,
    /// Catalog tag naming the class of agent expected to run this.
    pub agent_type: Option<String>,
    /// Instance tag of the agent that picked this up.
    pub agent_id: Option<String>,
    pub priority: i32,
    pub retry_count: i32,
    /// Sibling subtask ids this one waits on. Never contains `self.id`.
    pub blocked_by: Vec<Uuid>,
    /// Delegating agent, for hierarchical fan-out.
    pub parent_agent: Option<String>,
    pub batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
}

impl Subtask {
    pub fn new(task_list_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_list_id,
            description: description.into(),
            status: SubtaskStatus::Pending,
            agent_type: None,
            agent_id: None,
            priority: DEFAULT_SUBTASK_PRIORITY,
            retry_count: 0,
            blocked_by: Vec::new(),
            parent_agent: None,
            batch_id: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_reject_all_transitions() {
        assert!(SubtaskStatus::Completed.valid_transitions().is_empty());
        assert!(SubtaskStatus::Failed.valid_transitions().is_empty());
        assert!(!SubtaskStatus::Completed.can_transition_to(SubtaskStatus::Running));
        assert!(!SubtaskStatus::Failed.can_transition_to(SubtaskStatus::Pending));
    }

    #[test]
    fn running_can_reach_all_non_initial_states() {
        let from = SubtaskStatus::Running;
        assert!(from.can_transition_to(SubtaskStatus::Paused));
        assert!(from.can_transition_to(SubtaskStatus::Blocked));
        assert!(from.can_transition_to(SubtaskStatus::Completed));
        assert!(from.can_transition_to(SubtaskStatus::Failed));
        assert!(!from.can_transition_to(SubtaskStatus::Pending));
    }

    #[test]
    fn paused_and_blocked_resume_or_fail() {
        for from in [SubtaskStatus::Paused, SubtaskStatus::Blocked] {
            assert!(from.can_transition_to(SubtaskStatus::Running));
            assert!(from.can_transition_to(SubtaskStatus::Failed));
            assert!(!from.can_transition_to(SubtaskStatus::Completed));
        }
    }

    #[test]
    fn pending_starts_or_fails_on_session_close() {
        assert!(SubtaskStatus::Pending.can_transition_to(SubtaskStatus::Running));
        assert!(SubtaskStatus::Pending.can_transition_to(SubtaskStatus::Failed));
        assert!(!SubtaskStatus::Pending.can_transition_to(SubtaskStatus::Completed));
    }

    #[test]
    fn new_subtask_defaults() {
        let subtask = Subtask::new(Uuid::new_v4(), "index the repo");
        assert_eq!(subtask.status, SubtaskStatus::Pending);
        assert_eq!(subtask.priority, DEFAULT_SUBTASK_PRIORITY);
        assert_eq!(subtask.retry_count, 0);
        assert!(subtask.blocked_by.is_empty());
    }
}
