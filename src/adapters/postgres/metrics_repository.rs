//! Postgres implementation of the MetricsRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{MetricsRepository, MetricsSnapshot, TableCount};

#[derive(Clone)]
pub struct PgMetricsRepository {
    pool: PgPool,
}

impl PgMetricsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricsRepository for PgMetricsRepository {
    async fn snapshot(&self) -> DomainResult<MetricsSnapshot> {
        // One compact aggregate statement; feeds the 5s metrics ticker.
        let row: (i64, i64, i64, i64, i64, i64, i64, Option<f64>) = sqlx::query_as(
            r#"SELECT
                   (SELECT COUNT(*) FROM sessions WHERE ended_at IS NULL),
                   (SELECT COUNT(DISTINCT agent_id) FROM subtasks
                    WHERE status = 'running' AND agent_id IS NOT NULL),
                   (SELECT COUNT(*) FROM subtasks WHERE status = 'pending'),
                   (SELECT COUNT(*) FROM subtasks WHERE status = 'running'),
                   (SELECT COUNT(*) FROM subtasks
                    WHERE status = 'completed' AND completed_at > now() - INTERVAL '1 hour'),
                   (SELECT COUNT(*) FROM agent_messages
                    WHERE created_at > now() - INTERVAL '1 hour'),
                   (SELECT COUNT(*) FROM actions
                    WHERE created_at > now() - INTERVAL '1 minute'),
                   (SELECT AVG(EXTRACT(EPOCH FROM (completed_at - started_at)) * 1000)::FLOAT8
                    FROM subtasks
                    WHERE completed_at IS NOT NULL AND started_at IS NOT NULL)"#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(MetricsSnapshot {
            active_sessions: row.0,
            active_agents: row.1,
            pending_tasks: row.2,
            running_tasks: row.3,
            completed_last_hour: row.4,
            messages_last_hour: row.5,
            actions_per_minute: row.6 as f64,
            avg_task_duration_ms: row.7,
        })
    }

    async fn table_stats(&self) -> DomainResult<Vec<TableCount>> {
        let row: (i64, i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"SELECT
                   (SELECT COUNT(*) FROM projects),
                   (SELECT COUNT(*) FROM requests),
                   (SELECT COUNT(*) FROM task_lists),
                   (SELECT COUNT(*) FROM subtasks),
                   (SELECT COUNT(*) FROM actions),
                   (SELECT COUNT(*) FROM agent_messages),
                   (SELECT COUNT(*) FROM sessions),
                   (SELECT COUNT(*) FROM agent_contexts),
                   (SELECT COUNT(*) FROM wave_states)"#,
        )
        .fetch_one(&self.pool)
        .await?;

        let tables = [
            ("projects", row.0),
            ("requests", row.1),
            ("task_lists", row.2),
            ("subtasks", row.3),
            ("actions", row.4),
            ("agent_messages", row.5),
            ("sessions", row.6),
            ("agent_contexts", row.7),
            ("wave_states", row.8),
        ];

        Ok(tables
            .into_iter()
            .map(|(table, rows)| TableCount {
                table: table.to_string(),
                rows,
            })
            .collect())
    }
}
