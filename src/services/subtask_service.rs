//! Subtask domain service.
//!
//! Owns the subtask status machine and the hand-off to the wave controller
//! when a subtask reaches a terminal state.

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BusEvent, EventName, Subtask, SubtaskStatus, DEFAULT_SUBTASK_PRIORITY,
};
use crate::domain::ports::{
    RequestRepository, SubtaskFilter, SubtaskRepository, TaskListRepository,
};
use crate::gateway::channels::{Channel, GLOBAL_CHANNEL};
use crate::services::wave_controller::WaveController;

/// Input for subtask creation.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PostSubtask {
    pub task_list_id: Uuid,
    pub description: String,
    pub agent_type: Option<String>,
    pub priority: Option<i32>,
    #[serde(default)]
    pub blocked_by: Vec<Uuid>,
    pub parent_agent: Option<String>,
    pub batch_id: Option<Uuid>,
}

/// Input for a status patch.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PatchSubtask {
    pub status: SubtaskStatus,
    pub result: Option<serde_json::Value>,
    pub agent_id: Option<String>,
}

pub struct SubtaskService {
    subtasks: Arc<dyn SubtaskRepository>,
    task_lists: Arc<dyn TaskListRepository>,
    requests: Arc<dyn RequestRepository>,
    wave_controller: Arc<WaveController>,
}

impl SubtaskService {
    pub fn new(
        subtasks: Arc<dyn SubtaskRepository>,
        task_lists: Arc<dyn TaskListRepository>,
        requests: Arc<dyn RequestRepository>,
        wave_controller: Arc<WaveController>,
    ) -> Self {
        Self {
            subtasks,
            task_lists,
            requests,
            wave_controller,
        }
    }

    pub async fn create(&self, input: PostSubtask) -> DomainResult<Subtask> {
        if input.description.trim().is_empty() {
            return Err(DomainError::validation("description", "must not be empty"));
        }

        let task_list = self
            .task_lists
            .get(input.task_list_id)
            .await?
            .ok_or_else(|| DomainError::not_found("task_list", input.task_list_id))?;
        let request = self
            .requests
            .get(task_list.request_id)
            .await?
            .ok_or_else(|| DomainError::not_found("request", task_list.request_id))?;

        let mut subtask = Subtask::new(input.task_list_id, input.description);
        subtask.agent_type = input.agent_type;
        subtask.priority = input.priority.unwrap_or(DEFAULT_SUBTASK_PRIORITY);
        subtask.parent_agent = input.parent_agent;
        subtask.batch_id = input.batch_id;

        if !input.blocked_by.is_empty() {
            // blocked_by must name siblings, never the subtask itself.
            let siblings: HashSet<Uuid> = self
                .subtasks
                .sibling_ids(input.task_list_id)
                .await?
                .into_iter()
                .collect();
            for blocker in &input.blocked_by {
                if *blocker == subtask.id {
                    return Err(DomainError::validation(
                        "blocked_by",
                        "a subtask cannot block itself",
                    ));
                }
                if !siblings.contains(blocker) {
                    return Err(DomainError::validation(
                        "blocked_by",
                        format!("{blocker} is not a sibling subtask"),
                    ));
                }
            }
            subtask.blocked_by = input.blocked_by;
        }

        let data = serde_json::to_value(&subtask)?;
        let events = [
            BusEvent::new(GLOBAL_CHANNEL, EventName::SubtaskCreated, data.clone()),
            BusEvent::new(
                Channel::session(&request.session_id),
                EventName::SubtaskCreated,
                data,
            ),
        ];
        self.subtasks.create(&subtask, &events).await?;
        Ok(subtask)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Subtask> {
        self.subtasks
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("subtask", id))
    }

    pub async fn list(&self, filter: SubtaskFilter) -> DomainResult<Vec<Subtask>> {
        self.subtasks.list(filter).await
    }

    /// Apply a status patch under the status machine, then inform the wave
    /// controller when the subtask lands terminal.
    pub async fn patch_status(&self, id: Uuid, patch: PatchSubtask) -> DomainResult<Subtask> {
        let current = self.get(id).await?;

        if current.status.is_terminal() {
            return Err(DomainError::Conflict(format!(
                "subtask {id} is terminal ({})",
                current.status.as_str()
            )));
        }
        if !current.status.can_transition_to(patch.status) {
            return Err(DomainError::Conflict(format!(
                "invalid transition {} -> {}",
                current.status.as_str(),
                patch.status.as_str()
            )));
        }

        // Leaving blocked requires every blocker to have resolved.
        if current.status == SubtaskStatus::Blocked && patch.status == SubtaskStatus::Running {
            for blocker in &current.blocked_by {
                if let Some(sibling) = self.subtasks.get(*blocker).await? {
                    if !sibling.status.is_terminal() {
                        return Err(DomainError::Conflict(format!(
                            "subtask {id} is still blocked by {blocker}"
                        )));
                    }
                }
            }
        }

        let coordinates = self.subtasks.wave_coordinates(id).await?;

        let event_name = match patch.status {
            SubtaskStatus::Running => EventName::SubtaskRunning,
            SubtaskStatus::Completed => EventName::SubtaskCompleted,
            SubtaskStatus::Failed => EventName::SubtaskFailed,
            _ => EventName::SubtaskUpdated,
        };
        let data = serde_json::json!({
            "id": id,
            "status": patch.status.as_str(),
            "agent_id": patch.agent_id.clone().or(current.agent_id.clone()),
        });
        let mut events = vec![BusEvent::new(GLOBAL_CHANNEL, event_name, data.clone())];
        if let Some((session_id, _)) = &coordinates {
            events.push(BusEvent::new(Channel::session(session_id), event_name, data));
        }

        let updated = self
            .subtasks
            .update_status(id, patch.status, patch.result, patch.agent_id, &events)
            .await?;

        if updated.status.is_terminal() {
            if let Some((session_id, wave_number)) = coordinates {
                // The subtask update is already committed; counter
                // settlement failure must not undo the patch.
                if let Err(err) = self
                    .wave_controller
                    .complete_task(
                        &session_id,
                        wave_number,
                        updated.status == SubtaskStatus::Failed,
                    )
                    .await
                {
                    tracing::warn!(subtask_id = %id, "wave counter settlement failed: {err}");
                }
            }
        }

        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let events = [BusEvent::new(
            GLOBAL_CHANNEL,
            EventName::SystemInfo,
            serde_json::json!({ "message": "subtask deleted", "id": id }),
        )];
        self.subtasks.delete(id, &events).await
    }

    /// Bulk-fail every still-open subtask for the session. Wave counters
    /// are settled through the controller afterwards.
    pub async fn close_session_subtasks(&self, session_id: &str) -> DomainResult<Vec<Subtask>> {
        let failed = self
            .subtasks
            .close_session(
                session_id,
                serde_json::json!({ "error": "Session closed" }),
            )
            .await?;

        for subtask in &failed {
            if let Some((session, wave_number)) = self.subtasks.wave_coordinates(subtask.id).await? {
                // Wave rows may legitimately be absent for untracked lists.
                if let Err(err) = self
                    .wave_controller
                    .complete_task(&session, wave_number, true)
                    .await
                {
                    tracing::debug!(subtask_id = %subtask.id, "no wave to settle: {err}");
                }
            }
        }
        Ok(failed)
    }
}
