//! Metrics repository port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;

/// The compact aggregate behind `metric.update` and the dashboard KPIs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub active_sessions: i64,
    pub active_agents: i64,
    pub pending_tasks: i64,
    pub running_tasks: i64,
    pub completed_last_hour: i64,
    pub messages_last_hour: i64,
    pub actions_per_minute: f64,
    pub avg_task_duration_ms: Option<f64>,
}

/// Per-table row count for the stats probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

/// Repository interface for aggregate queries.
#[async_trait]
pub trait MetricsRepository: Send + Sync {
    /// One compact aggregate statement feeding the metrics ticker.
    async fn snapshot(&self) -> DomainResult<MetricsSnapshot>;

    /// Row counts per table for the dashboard stats probe.
    async fn table_stats(&self) -> DomainResult<Vec<TableCount>>;
}
