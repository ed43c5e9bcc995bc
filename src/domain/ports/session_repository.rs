//! Session repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::{ActiveAgent, BusEvent, Session, SessionStats};

/// Repository interface for Session persistence.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Fetch the session, creating it on first sight. Returns the row and
    /// whether it was created; `events` are emitted only on creation.
    async fn get_or_create(&self, id: &str, events: &[BusEvent]) -> DomainResult<(Session, bool)>;

    async fn get(&self, id: &str) -> DomainResult<Option<Session>>;

    async fn list(&self, active_only: bool) -> DomainResult<Vec<Session>>;

    /// Set `ended_at`, returning the updated row. Idempotent: ending an
    /// already-ended session is a no-op returning the row unchanged.
    async fn end(&self, id: &str, events: &[BusEvent]) -> DomainResult<Option<Session>>;

    async fn stats(&self) -> DomainResult<SessionStats>;

    /// Close sessions started before the cutoff with no action since the
    /// inactivity horizon; returns the count closed.
    async fn close_orphaned(
        &self,
        started_before: DateTime<Utc>,
        inactive_since: DateTime<Utc>,
    ) -> DomainResult<u64>;

    /// Agents with running subtasks, derived by a single joined statement.
    async fn active_agents(&self) -> DomainResult<Vec<ActiveAgent>>;
}
