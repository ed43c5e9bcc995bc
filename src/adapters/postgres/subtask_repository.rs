//! Postgres implementation of the SubtaskRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::adapters::postgres::notify::{notify_all, notify_event};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BusEvent, EventName, Subtask, SubtaskStatus};
use crate::domain::ports::{SubtaskFilter, SubtaskRepository};
use crate::gateway::channels::{Channel, GLOBAL_CHANNEL};

#[derive(Clone)]
pub struct PgSubtaskRepository {
    pool: PgPool,
}

impl PgSubtaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SubtaskRow {
    id: Uuid,
    task_list_id: Uuid,
    description: String,
    status: String,
    agent_type: Option<String>,
    agent_id: Option<String>,
    priority: i32,
    retry_count: i32,
    blocked_by: Vec<Uuid>,
    parent_agent: Option<String>,
    batch_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<serde_json::Value>,
}

impl TryFrom<SubtaskRow> for Subtask {
    type Error = DomainError;

    fn try_from(r: SubtaskRow) -> Result<Self, Self::Error> {
        let status = SubtaskStatus::from_str(&r.status)
            .ok_or_else(|| DomainError::Serialization(format!("bad subtask status: {}", r.status)))?;
        Ok(Subtask {
            id: r.id,
            task_list_id: r.task_list_id,
            description: r.description,
            status,
            agent_type: r.agent_type,
            agent_id: r.agent_id,
            priority: r.priority,
            retry_count: r.retry_count,
            blocked_by: r.blocked_by,
            parent_agent: r.parent_agent,
            batch_id: r.batch_id,
            created_at: r.created_at,
            started_at: r.started_at,
            completed_at: r.completed_at,
            result: r.result,
        })
    }
}

const COLUMNS: &str = "id, task_list_id, description, status, agent_type, agent_id, priority, \
                       retry_count, blocked_by, parent_agent, batch_id, created_at, started_at, \
                       completed_at, result";

#[async_trait]
impl SubtaskRepository for PgSubtaskRepository {
    async fn create(&self, subtask: &Subtask, events: &[BusEvent]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO subtasks (id, task_list_id, description, status, agent_type, agent_id,
               priority, retry_count, blocked_by, parent_agent, batch_id, created_at, started_at,
               completed_at, result)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"#,
        )
        .bind(subtask.id)
        .bind(subtask.task_list_id)
        .bind(&subtask.description)
        .bind(subtask.status.as_str())
        .bind(&subtask.agent_type)
        .bind(&subtask.agent_id)
        .bind(subtask.priority)
        .bind(subtask.retry_count)
        .bind(&subtask.blocked_by)
        .bind(&subtask.parent_agent)
        .bind(subtask.batch_id)
        .bind(subtask.created_at)
        .bind(subtask.started_at)
        .bind(subtask.completed_at)
        .bind(&subtask.result)
        .execute(&mut *tx)
        .await?;

        // Creation counts against the owning wave atomically.
        sqlx::query(
            r#"UPDATE wave_states ws SET total_tasks = ws.total_tasks + 1
               FROM task_lists tl
               JOIN requests r ON r.id = tl.request_id
               WHERE tl.id = $1
                 AND ws.session_id = r.session_id
                 AND ws.wave_number = tl.wave_number"#,
        )
        .bind(subtask.task_list_id)
        .execute(&mut *tx)
        .await?;

        // A referenced batch comes into existence with its first member.
        if let Some(batch_id) = subtask.batch_id {
            sqlx::query(
                r#"INSERT INTO orchestration_batches (id, session_id, wave_number)
                   SELECT $1, r.session_id, tl.wave_number
                   FROM task_lists tl
                   JOIN requests r ON r.id = tl.request_id
                   WHERE tl.id = $2
                   ON CONFLICT (id) DO NOTHING"#,
            )
            .bind(batch_id)
            .bind(subtask.task_list_id)
            .execute(&mut *tx)
            .await?;
        }

        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Subtask>> {
        let row: Option<SubtaskRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM subtasks WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: SubtaskFilter) -> DomainResult<Vec<Subtask>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM subtasks WHERE TRUE"));

        if let Some(task_list_id) = filter.task_list_id {
            builder.push(" AND task_list_id = ").push_bind(task_list_id);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(agent_type) = filter.agent_type {
            builder.push(" AND agent_type = ").push_bind(agent_type);
        }
        if let Some(parent_agent) = filter.parent_agent {
            builder.push(" AND parent_agent = ").push_bind(parent_agent);
        }
        if let Some(since) = filter.since {
            builder.push(" AND created_at >= ").push_bind(since);
        }
        builder.push(" ORDER BY created_at DESC");
        builder.push(" LIMIT ").push_bind(filter.limit.unwrap_or(500));

        let rows: Vec<SubtaskRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn sibling_ids(&self, task_list_id: Uuid) -> DomainResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM subtasks WHERE task_list_id = $1")
                .bind(task_list_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: SubtaskStatus,
        result: Option<serde_json::Value>,
        agent_id: Option<String>,
        events: &[BusEvent],
    ) -> DomainResult<Subtask> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let row: Option<SubtaskRow> = sqlx::query_as(&format!(
            r#"UPDATE subtasks SET
                   status = $2,
                   result = COALESCE($3, result),
                   agent_id = COALESCE($4, agent_id),
                   started_at = CASE WHEN $2 = 'running' THEN COALESCE(started_at, $5)
                                     ELSE started_at END,
                   completed_at = CASE WHEN $2 IN ('completed', 'failed')
                                       THEN COALESCE(completed_at, $5)
                                       ELSE completed_at END
               WHERE id = $1
               RETURNING {COLUMNS}"#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(&result)
        .bind(&agent_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(DomainError::not_found("subtask", id));
        };
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn delete(&self, id: Uuid, events: &[BusEvent]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM subtasks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("subtask", id));
        }
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn close_session(
        &self,
        session_id: &str,
        result: serde_json::Value,
    ) -> DomainResult<Vec<Subtask>> {
        let mut tx = self.pool.begin().await?;
        let rows: Vec<SubtaskRow> = sqlx::query_as(
            r#"UPDATE subtasks SET status = 'failed', result = $2, completed_at = now()
               FROM task_lists tl
               JOIN requests r ON r.id = tl.request_id
               WHERE subtasks.task_list_id = tl.id
                 AND r.session_id = $1
                 AND subtasks.status IN ('pending', 'running', 'paused', 'blocked')
               RETURNING subtasks.id, subtasks.task_list_id, subtasks.description,
                         subtasks.status, subtasks.agent_type, subtasks.agent_id,
                         subtasks.priority, subtasks.retry_count, subtasks.blocked_by,
                         subtasks.parent_agent, subtasks.batch_id, subtasks.created_at,
                         subtasks.started_at, subtasks.completed_at, subtasks.result"#,
        )
        .bind(session_id)
        .bind(&result)
        .fetch_all(&mut *tx)
        .await?;

        let session_channel = Channel::session(session_id);
        for row in &rows {
            let data = serde_json::json!({ "id": row.id, "session_id": session_id });
            for channel in [GLOBAL_CHANNEL.to_string(), session_channel.clone()] {
                notify_event(
                    &mut *tx,
                    &BusEvent::new(channel, EventName::SubtaskFailed, data.clone()),
                )
                .await?;
            }
        }
        tx.commit().await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn wave_coordinates(&self, subtask_id: Uuid) -> DomainResult<Option<(String, i32)>> {
        let row: Option<(String, i32)> = sqlx::query_as(
            r#"SELECT r.session_id, tl.wave_number
               FROM subtasks s
               JOIN task_lists tl ON tl.id = s.task_list_id
               JOIN requests r ON r.id = tl.request_id
               WHERE s.id = $1"#,
        )
        .bind(subtask_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn fail_stuck(
        &self,
        started_before: DateTime<Utc>,
        inactive_since: DateTime<Utc>,
        result: serde_json::Value,
    ) -> DomainResult<u64> {
        let outcome = sqlx::query(
            r#"UPDATE subtasks SET status = 'failed', result = $3, completed_at = now()
               WHERE status IN ('running', 'paused', 'blocked')
                 AND started_at IS NOT NULL
                 AND started_at < $1
                 AND NOT EXISTS (
                     SELECT 1 FROM actions a
                     WHERE a.subtask_id = subtasks.id AND a.created_at > $2
                 )"#,
        )
        .bind(started_before)
        .bind(inactive_since)
        .bind(&result)
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected())
    }
}
