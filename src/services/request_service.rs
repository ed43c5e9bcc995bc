//! Request domain service.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BusEvent, EventName, Request, RequestStatus};
use crate::domain::ports::{ProjectRepository, RequestRepository, SessionRepository};
use crate::gateway::channels::{Channel, GLOBAL_CHANNEL};
use crate::services::token_service::validate_session_id;

/// Input for request creation.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PostRequest {
    pub project_id: Uuid,
    pub session_id: String,
    pub prompt: String,
}

pub struct RequestService {
    requests: Arc<dyn RequestRepository>,
    projects: Arc<dyn ProjectRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl RequestService {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        projects: Arc<dyn ProjectRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            requests,
            projects,
            sessions,
        }
    }

    pub async fn create(&self, input: PostRequest) -> DomainResult<Request> {
        if input.prompt.trim().is_empty() {
            return Err(DomainError::validation("prompt", "must not be empty"));
        }
        validate_session_id(&input.session_id)?;

        if self.projects.get(input.project_id).await?.is_none() {
            return Err(DomainError::not_found("project", input.project_id));
        }

        // First sight of a session id registers the session.
        let session_events = [BusEvent::new(
            GLOBAL_CHANNEL,
            EventName::SessionCreated,
            serde_json::json!({ "session_id": input.session_id }),
        )];
        self.sessions
            .get_or_create(&input.session_id, &session_events)
            .await?;

        let request = Request::new(input.project_id, input.session_id, input.prompt);
        let data = serde_json::to_value(&request)?;
        let events = [
            BusEvent::new(GLOBAL_CHANNEL, EventName::TaskCreated, data.clone()),
            BusEvent::new(Channel::session(&request.session_id), EventName::TaskCreated, data),
        ];
        self.requests.create(&request, &events).await?;
        Ok(request)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Request> {
        self.requests
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("request", id))
    }

    pub async fn list_by_project(&self, project_id: Uuid) -> DomainResult<Vec<Request>> {
        self.requests.list_by_project(project_id).await
    }

    pub async fn list_by_session(&self, session_id: &str) -> DomainResult<Vec<Request>> {
        self.requests.list_by_session(session_id).await
    }

    pub async fn update_status(&self, id: Uuid, status: RequestStatus) -> DomainResult<Request> {
        let current = self.get(id).await?;
        if current.status.is_terminal() {
            return Err(DomainError::Conflict(format!(
                "request {id} is already {}",
                current.status.as_str()
            )));
        }

        let completed_at = status.is_terminal().then(Utc::now);
        let event_name = match status {
            RequestStatus::Completed => EventName::TaskCompleted,
            RequestStatus::Failed => EventName::TaskFailed,
            _ => EventName::TaskUpdated,
        };
        let data = serde_json::json!({
            "id": id,
            "session_id": current.session_id,
            "status": status.as_str(),
        });
        let events = [
            BusEvent::new(GLOBAL_CHANNEL, event_name, data.clone()),
            BusEvent::new(Channel::session(&current.session_id), event_name, data),
        ];
        self.requests
            .update_status(id, status, completed_at, &events)
            .await
    }

    pub async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let events = [BusEvent::new(
            GLOBAL_CHANNEL,
            EventName::SystemInfo,
            serde_json::json!({ "message": "request deleted", "id": id }),
        )];
        self.requests.delete(id, &events).await
    }
}
