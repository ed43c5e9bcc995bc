//! Agent context briefs and compact snapshots.
//!
//! Role snapshots are durable per (project, agent). Brief rendering is
//! pluggable behind [`BriefFormatter`] so the template engine stays outside
//! the core; the default formatter produces a plain structured brief.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentContext, BusEvent, EventName, COMPACT_SNAPSHOT_AGENT_TYPE,
};
use crate::domain::ports::{ContextRepository, ProjectRepository};
use crate::gateway::channels::Channel;
use crate::services::token_service::{validate_agent_id, validate_session_id};

/// Renders a context brief for an agent. Implementations may template this
/// however they like; the core only guarantees the inputs.
pub trait BriefFormatter: Send + Sync {
    fn format(&self, context: &AgentContext) -> serde_json::Value;
}

/// Structured pass-through brief.
#[derive(Default)]
pub struct PlainBriefFormatter;

impl BriefFormatter for PlainBriefFormatter {
    fn format(&self, context: &AgentContext) -> serde_json::Value {
        serde_json::json!({
            "agent_id": context.agent_id,
            "agent_type": context.agent_type,
            "role_context": context.role_context,
            "last_updated": context.last_updated,
        })
    }
}

/// Input for context generation.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GenerateContext {
    pub project_id: Uuid,
    pub agent_id: String,
    pub agent_type: Option<String>,
    pub role_context: serde_json::Value,
}

/// Input for a compact snapshot save.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SaveSnapshot {
    pub project_id: Uuid,
    pub session_id: String,
    pub snapshot: serde_json::Value,
}

pub struct ContextService {
    contexts: Arc<dyn ContextRepository>,
    projects: Arc<dyn ProjectRepository>,
    formatter: Arc<dyn BriefFormatter>,
}

impl ContextService {
    pub fn new(
        contexts: Arc<dyn ContextRepository>,
        projects: Arc<dyn ProjectRepository>,
        formatter: Arc<dyn BriefFormatter>,
    ) -> Self {
        Self {
            contexts,
            projects,
            formatter,
        }
    }

    /// Upsert the role snapshot for (project, agent).
    pub async fn generate(&self, input: GenerateContext) -> DomainResult<AgentContext> {
        validate_agent_id(&input.agent_id)?;
        if self.projects.get(input.project_id).await?.is_none() {
            return Err(DomainError::not_found("project", input.project_id));
        }

        let mut context = AgentContext::new(input.project_id, &input.agent_id);
        context.agent_type = input.agent_type;
        context.role_context = input.role_context;

        let events = [BusEvent::new(
            Channel::agent(&input.agent_id),
            EventName::SystemInfo,
            serde_json::json!({ "message": "context updated", "agent_id": input.agent_id }),
        )];
        self.contexts.upsert(&context, &events).await
    }

    /// The rendered brief for one agent across its known contexts.
    pub async fn brief(&self, agent_id: &str) -> DomainResult<Vec<serde_json::Value>> {
        validate_agent_id(agent_id)?;
        let contexts = self.contexts.list_by_agent(agent_id).await?;
        Ok(contexts.iter().map(|c| self.formatter.format(c)).collect())
    }

    /// Persist a compact snapshot for the session before compaction.
    pub async fn save_snapshot(&self, input: SaveSnapshot) -> DomainResult<AgentContext> {
        validate_session_id(&input.session_id)?;
        if self.projects.get(input.project_id).await?.is_none() {
            return Err(DomainError::not_found("project", input.project_id));
        }

        let mut context = AgentContext::new(input.project_id, &input.session_id);
        context.agent_type = Some(COMPACT_SNAPSHOT_AGENT_TYPE.to_string());
        context.role_context = input.snapshot;
        context.last_updated = Utc::now();

        self.contexts.upsert(&context, &[]).await
    }

    /// Restore the latest snapshot for a session.
    pub async fn restore_snapshot(&self, session_id: &str) -> DomainResult<AgentContext> {
        validate_session_id(session_id)?;
        self.contexts
            .latest_snapshot(session_id)
            .await?
            .ok_or_else(|| DomainError::not_found("compact_snapshot", session_id))
    }

    /// Whether a snapshot exists for the session, and when it was taken.
    pub async fn snapshot_status(&self, session_id: &str) -> DomainResult<serde_json::Value> {
        validate_session_id(session_id)?;
        Ok(match self.contexts.latest_snapshot(session_id).await? {
            Some(snapshot) => serde_json::json!({
                "session_id": session_id,
                "exists": true,
                "saved_at": snapshot.last_updated,
            }),
            None => serde_json::json!({ "session_id": session_id, "exists": false }),
        })
    }

    pub async fn get_snapshot(&self, session_id: &str) -> DomainResult<AgentContext> {
        self.restore_snapshot(session_id).await
    }
}
