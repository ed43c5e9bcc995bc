//! Session lifecycle service.

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActiveAgent, BusEvent, EventName, Session, SessionStats};
use crate::domain::ports::SessionRepository;
use crate::gateway::channels::{Channel, GLOBAL_CHANNEL};
use crate::services::token_service::validate_session_id;

pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
}

impl SessionService {
    pub fn new(sessions: Arc<dyn SessionRepository>) -> Self {
        Self { sessions }
    }

    /// Register a session on first sight; idempotent afterwards.
    pub async fn start(&self, session_id: &str) -> DomainResult<Session> {
        validate_session_id(session_id)?;
        let events = [BusEvent::new(
            GLOBAL_CHANNEL,
            EventName::SessionCreated,
            serde_json::json!({ "session_id": session_id }),
        )];
        let (session, _created) = self.sessions.get_or_create(session_id, &events).await?;
        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> DomainResult<Session> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| DomainError::not_found("session", session_id))
    }

    pub async fn list(&self, active_only: bool) -> DomainResult<Vec<Session>> {
        self.sessions.list(active_only).await
    }

    /// Close a session. Idempotent: ending twice leaves `ended_at` alone.
    pub async fn end(&self, session_id: &str) -> DomainResult<Session> {
        validate_session_id(session_id)?;
        let events = [
            BusEvent::new(
                GLOBAL_CHANNEL,
                EventName::SessionEnded,
                serde_json::json!({ "session_id": session_id }),
            ),
            BusEvent::new(
                Channel::session(session_id),
                EventName::SessionEnded,
                serde_json::json!({ "session_id": session_id }),
            ),
        ];
        self.sessions
            .end(session_id, &events)
            .await?
            .ok_or_else(|| DomainError::not_found("session", session_id))
    }

    pub async fn stats(&self) -> DomainResult<SessionStats> {
        self.sessions.stats().await
    }

    pub async fn active_agents(&self) -> DomainResult<Vec<ActiveAgent>> {
        self.sessions.active_agents().await
    }
}
