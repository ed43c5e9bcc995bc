//! Task-list repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BusEvent, TaskList, TaskListStatus};

/// Per-wave aggregate over a session's task-lists, used to synthesize wave
/// history when no wave_states rows exist.
#[derive(Debug, Clone)]
pub struct WaveAggregate {
    pub wave_number: i32,
    pub total_tasks: i32,
    pub completed_tasks: i32,
    pub failed_tasks: i32,
    pub earliest_started: Option<DateTime<Utc>>,
    pub latest_completed: Option<DateTime<Utc>>,
}

/// Repository interface for TaskList persistence.
#[async_trait]
pub trait TaskListRepository: Send + Sync {
    /// Insert the task-list, or return the existing row for the same
    /// `(request_id, wave_number)` (idempotent).
    async fn get_or_create(&self, task_list: &TaskList, events: &[BusEvent]) -> DomainResult<TaskList>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<TaskList>>;

    async fn list_by_request(&self, request_id: Uuid) -> DomainResult<Vec<TaskList>>;

    async fn update_status(
        &self,
        id: Uuid,
        status: TaskListStatus,
        events: &[BusEvent],
    ) -> DomainResult<TaskList>;

    async fn delete(&self, id: Uuid, events: &[BusEvent]) -> DomainResult<()>;

    /// Aggregate subtask counters per wave across all of a session's
    /// requests, one joined statement.
    async fn session_wave_aggregates(&self, session_id: &str) -> DomainResult<Vec<WaveAggregate>>;
}
