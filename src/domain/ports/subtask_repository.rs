//! Subtask repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BusEvent, Subtask, SubtaskStatus};

/// Filter criteria for listing subtasks.
#[derive(Debug, Clone, Default)]
pub struct SubtaskFilter {
    pub task_list_id: Option<Uuid>,
    pub status: Option<SubtaskStatus>,
    pub agent_type: Option<String>,
    pub parent_agent: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// Repository interface for Subtask persistence.
#[async_trait]
pub trait SubtaskRepository: Send + Sync {
    /// Insert the subtask and increment the owning wave's total counter in
    /// the same transaction.
    async fn create(&self, subtask: &Subtask, events: &[BusEvent]) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Subtask>>;

    async fn list(&self, filter: SubtaskFilter) -> DomainResult<Vec<Subtask>>;

    /// Sibling ids within the same task-list (for blocked_by validation).
    async fn sibling_ids(&self, task_list_id: Uuid) -> DomainResult<Vec<Uuid>>;

    /// Patch status, result and lifecycle timestamps, returning the updated
    /// row.
    async fn update_status(
        &self,
        id: Uuid,
        status: SubtaskStatus,
        result: Option<serde_json::Value>,
        agent_id: Option<String>,
        events: &[BusEvent],
    ) -> DomainResult<Subtask>;

    async fn delete(&self, id: Uuid, events: &[BusEvent]) -> DomainResult<()>;

    /// Fail every still-open subtask for the session; returns the affected
    /// rows. Emits one `subtask.failed` event per row, in the same
    /// transaction as the update.
    async fn close_session(
        &self,
        session_id: &str,
        result: serde_json::Value,
    ) -> DomainResult<Vec<Subtask>>;

    /// Resolve the `(session_id, wave_number)` owning a subtask via its
    /// task-list and request, one joined statement.
    async fn wave_coordinates(&self, subtask_id: Uuid) -> DomainResult<Option<(String, i32)>>;

    /// Fail subtasks stuck in running/paused/blocked with no recent action;
    /// returns affected rows.
    async fn fail_stuck(
        &self,
        started_before: DateTime<Utc>,
        inactive_since: DateTime<Utc>,
        result: serde_json::Value,
    ) -> DomainResult<u64>;
}
