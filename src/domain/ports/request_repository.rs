//! Request repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BusEvent, Request, RequestStatus};

/// Repository interface for Request persistence.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn create(&self, request: &Request, events: &[BusEvent]) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Request>>;

    async fn list_by_project(&self, project_id: Uuid) -> DomainResult<Vec<Request>>;

    async fn list_by_session(&self, session_id: &str) -> DomainResult<Vec<Request>>;

    /// Patch status (and completion time for terminal statuses), returning
    /// the updated row.
    async fn update_status(
        &self,
        id: Uuid,
        status: RequestStatus,
        completed_at: Option<DateTime<Utc>>,
        events: &[BusEvent],
    ) -> DomainResult<Request>;

    async fn delete(&self, id: Uuid, events: &[BusEvent]) -> DomainResult<()>;
}
