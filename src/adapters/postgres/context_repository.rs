//! Postgres implementation of the ContextRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::adapters::postgres::notify::notify_all;
use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentContext, BusEvent, COMPACT_SNAPSHOT_AGENT_TYPE};
use crate::domain::ports::ContextRepository;

#[derive(Clone)]
pub struct PgContextRepository {
    pool: PgPool,
}

impl PgContextRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ContextRow {
    id: Uuid,
    project_id: Uuid,
    agent_id: String,
    agent_type: Option<String>,
    role_context: serde_json::Value,
    last_updated: DateTime<Utc>,
}

impl From<ContextRow> for AgentContext {
    fn from(r: ContextRow) -> Self {
        AgentContext {
            id: r.id,
            project_id: r.project_id,
            agent_id: r.agent_id,
            agent_type: r.agent_type,
            role_context: r.role_context,
            last_updated: r.last_updated,
        }
    }
}

const COLUMNS: &str = "id, project_id, agent_id, agent_type, role_context, last_updated";

#[async_trait]
impl ContextRepository for PgContextRepository {
    async fn upsert(&self, context: &AgentContext, events: &[BusEvent]) -> DomainResult<AgentContext> {
        let mut tx = self.pool.begin().await?;
        let row: ContextRow = sqlx::query_as(&format!(
            r#"INSERT INTO agent_contexts (id, project_id, agent_id, agent_type, role_context, last_updated)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (project_id, agent_id) DO UPDATE SET
                   agent_type = EXCLUDED.agent_type,
                   role_context = EXCLUDED.role_context,
                   last_updated = EXCLUDED.last_updated
               RETURNING {COLUMNS}"#
        ))
        .bind(context.id)
        .bind(context.project_id)
        .bind(&context.agent_id)
        .bind(&context.agent_type)
        .bind(&context.role_context)
        .bind(context.last_updated)
        .fetch_one(&mut *tx)
        .await?;
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn get(&self, project_id: Uuid, agent_id: &str) -> DomainResult<Option<AgentContext>> {
        let row: Option<ContextRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM agent_contexts WHERE project_id = $1 AND agent_id = $2"
        ))
        .bind(project_id)
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_by_agent(&self, agent_id: &str) -> DomainResult<Vec<AgentContext>> {
        let rows: Vec<ContextRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM agent_contexts WHERE agent_id = $1 ORDER BY last_updated DESC"
        ))
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn latest_snapshot(&self, session_id: &str) -> DomainResult<Option<AgentContext>> {
        // Snapshots key their agent_id by session.
        let row: Option<ContextRow> = sqlx::query_as(&format!(
            r#"SELECT {COLUMNS} FROM agent_contexts
               WHERE agent_type = $1 AND agent_id = $2
               ORDER BY last_updated DESC LIMIT 1"#
        ))
        .bind(COMPACT_SNAPSHOT_AGENT_TYPE)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_stale(
        &self,
        updated_before: DateTime<Utc>,
        active_since: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let result = sqlx::query(
            r#"DELETE FROM agent_contexts
               WHERE (agent_type IS NULL OR agent_type <> $1)
                 AND (role_context->>'status' IN ('running', 'paused', 'blocked')
                      OR role_context->>'status' IS NULL)
                 AND last_updated < $2
                 AND NOT EXISTS (
                     SELECT 1 FROM subtasks s
                     WHERE s.agent_id = agent_contexts.agent_id
                       AND (s.created_at > $3
                            OR s.started_at > $3
                            OR s.completed_at > $3)
                 )"#,
        )
        .bind(COMPACT_SNAPSHOT_AGENT_TYPE)
        .bind(updated_before)
        .bind(active_since)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_old_snapshots(&self, updated_before: DateTime<Utc>) -> DomainResult<u64> {
        let result =
            sqlx::query("DELETE FROM agent_contexts WHERE agent_type = $1 AND last_updated < $2")
                .bind(COMPACT_SNAPSHOT_AGENT_TYPE)
                .bind(updated_before)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
