//! Wave state domain model.
//!
//! A wave is the per-(session, wave_number) counter record coordinating an
//! ordered batch of subtasks. At most one wave per session is running at any
//! time, and `completed_tasks + failed_tasks` never exceeds `total_tasks`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl Default for WaveStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl WaveStatus {
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

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        match self {
            Self::Pending => matches!(new_status, Self::Running | Self::Failed),
            Self::Running => matches!(new_status, Self::Completed | Self::Failed),
            Self::Completed | Self::Failed => false,
        }
    }
}

/// Per-(session, wave_number) counter record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveState {
    pub id: Uuid,
    pub session_id: String,
    pub wave_number: i32,
    pub total_tasks: i32,
    pub completed_tasks: i32,
    pub failed_tasks: i32,
    pub status: WaveStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WaveState {
    pub fn new(session_id: impl Into<String>, wave_number: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            wave_number,
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            status: WaveStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }

    /// All counted tasks have reached a terminal state.
    pub fn is_exhausted(&self) -> bool {
        self.total_tasks > 0 && self.completed_tasks + self.failed_tasks >= self.total_tasks
    }

    /// Counter invariant: terminal counts never exceed the total.
    pub fn counters_consistent(&self) -> bool {
        self.completed_tasks >= 0
            && self.failed_tasks >= 0
            && self.completed_tasks + self.failed_tasks <= self.total_tasks
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_starts_running_terminals_stay() {
        assert!(WaveStatus::Pending.can_transition_to(WaveStatus::Running));
        assert!(WaveStatus::Running.can_transition_to(WaveStatus::Completed));
        assert!(WaveStatus::Running.can_transition_to(WaveStatus::Failed));
        assert!(!WaveStatus::Completed.can_transition_to(WaveStatus::Running));
        assert!(!WaveStatus::Failed.can_transition_to(WaveStatus::Pending));
    }

    #[test]
    fn exhaustion_requires_counted_tasks() {
        let mut wave = WaveState::new("s1", 0);
        assert!(!wave.is_exhausted());
        wave.total_tasks = 2;
        wave.completed_tasks = 1;
        assert!(!wave.is_exhausted());
        wave.failed_tasks = 1;
        assert!(wave.is_exhausted());
        assert!(wave.counters_consistent());
    }

    #[test]
    fn duration_needs_both_timestamps() {
        let mut wave = WaveState::new("s1", 0);
        assert_eq!(wave.duration_ms(), None);
        let start = Utc::now();
        wave.started_at = Some(start);
        wave.completed_at = Some(start + chrono::Duration::milliseconds(1500));
        assert_eq!(wave.duration_ms(), Some(1500));
    }
}
