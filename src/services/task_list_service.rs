//! Task-list (wave) domain service.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BusEvent, EventName, TaskList, TaskListStatus};
use crate::domain::ports::{RequestRepository, TaskListRepository, WaveRepository};
use crate::gateway::channels::{Channel, GLOBAL_CHANNEL};

/// Input for task-list creation.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PostTaskList {
    pub request_id: Uuid,
    pub wave_number: i32,
}

pub struct TaskListService {
    task_lists: Arc<dyn TaskListRepository>,
    requests: Arc<dyn RequestRepository>,
    waves: Arc<dyn WaveRepository>,
}

impl TaskListService {
    pub fn new(
        task_lists: Arc<dyn TaskListRepository>,
        requests: Arc<dyn RequestRepository>,
        waves: Arc<dyn WaveRepository>,
    ) -> Self {
        Self {
            task_lists,
            requests,
            waves,
        }
    }

    /// Create the task-list for `(request, wave_number)`, idempotently, and
    /// ensure the matching wave state exists.
    pub async fn create(&self, input: PostTaskList) -> DomainResult<TaskList> {
        if input.wave_number < 0 {
            return Err(DomainError::validation("wave_number", "must be non-negative"));
        }
        let request = self
            .requests
            .get(input.request_id)
            .await?
            .ok_or_else(|| DomainError::not_found("request", input.request_id))?;

        let task_list = TaskList::new(input.request_id, input.wave_number);
        let data = serde_json::to_value(&task_list)?;
        let events = [
            BusEvent::new(GLOBAL_CHANNEL, EventName::TaskCreated, data.clone()),
            BusEvent::new(Channel::session(&request.session_id), EventName::TaskCreated, data),
        ];
        let created = self.task_lists.get_or_create(&task_list, &events).await?;

        self.waves
            .get_or_create(&request.session_id, input.wave_number)
            .await?;

        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<TaskList> {
        self.task_lists
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("task_list", id))
    }

    pub async fn list_by_request(&self, request_id: Uuid) -> DomainResult<Vec<TaskList>> {
        self.task_lists.list_by_request(request_id).await
    }

    pub async fn update_status(&self, id: Uuid, status: TaskListStatus) -> DomainResult<TaskList> {
        let current = self.get(id).await?;
        if current.status.is_terminal() {
            return Err(DomainError::Conflict(format!(
                "task list {id} is already {}",
                current.status.as_str()
            )));
        }

        let event_name = match status {
            TaskListStatus::Completed => EventName::TaskCompleted,
            TaskListStatus::Failed => EventName::TaskFailed,
            _ => EventName::TaskUpdated,
        };
        let events = [BusEvent::new(
            GLOBAL_CHANNEL,
            event_name,
            serde_json::json!({ "id": id, "status": status.as_str() }),
        )];
        self.task_lists.update_status(id, status, &events).await
    }

    pub async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let events = [BusEvent::new(
            GLOBAL_CHANNEL,
            EventName::SystemInfo,
            serde_json::json!({ "message": "task list deleted", "id": id }),
        )];
        self.task_lists.delete(id, &events).await
    }
}
