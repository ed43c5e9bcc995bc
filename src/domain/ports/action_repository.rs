//! Action repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Action, BusEvent, HourlyActionCount, TokenConsumption};

/// Repository interface for Action persistence.
#[async_trait]
pub trait ActionRepository: Send + Sync {
    async fn create(&self, action: &Action, events: &[BusEvent]) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Action>>;

    /// Actions for one subtask, newest first, one joined statement.
    async fn list_by_subtask(&self, subtask_id: Uuid, limit: i64) -> DomainResult<Vec<Action>>;

    /// Hourly histogram of action counts and mean duration since `since`.
    async fn hourly(&self, since: DateTime<Utc>) -> DomainResult<Vec<HourlyActionCount>>;

    /// Append one token-consumption row.
    async fn record_tokens(&self, row: &TokenConsumption) -> DomainResult<()>;
}
