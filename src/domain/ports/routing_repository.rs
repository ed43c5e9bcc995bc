//! Routing score repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::{KeywordToolScore, RoutingStats};

/// Repository interface for keyword/tool scoring rows.
#[async_trait]
pub trait RoutingRepository: Send + Sync {
    /// All rows matching any of the given keywords.
    async fn pairs_for_keywords(&self, keywords: &[String]) -> DomainResult<Vec<KeywordToolScore>>;

    async fn get_pair(&self, keyword: &str, tool_name: &str)
        -> DomainResult<Option<KeywordToolScore>>;

    /// Upsert one `(keyword, tool)` row: set score and tool type, bump
    /// usage (and success when flagged), stamp `last_used`.
    #[allow(clippy::too_many_arguments)]
    async fn upsert_pair(
        &self,
        keyword: &str,
        tool_name: &str,
        tool_type: Option<&str>,
        score: f64,
        increment_success: bool,
        last_used: DateTime<Utc>,
    ) -> DomainResult<()>;

    /// Append one feedback outcome to the audit trail for the accuracy KPI.
    async fn record_feedback(&self, accepted: bool, at: DateTime<Utc>) -> DomainResult<()>;

    /// Aggregate statistics; accuracy is computed over feedback newer than
    /// `accuracy_window_start`.
    async fn stats(&self, accuracy_window_start: DateTime<Utc>) -> DomainResult<RoutingStats>;
}
