//! Postgres implementation of the SessionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::adapters::postgres::notify::notify_all;
use crate::domain::errors::DomainResult;
use crate::domain::models::{ActiveAgent, BusEvent, Session, SessionStats};
use crate::domain::ports::SessionRepository;

#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    request_count: i64,
    subtask_count: i64,
}

impl From<SessionRow> for Session {
    fn from(r: SessionRow) -> Self {
        Session {
            id: r.id,
            started_at: r.started_at,
            ended_at: r.ended_at,
            request_count: r.request_count,
            subtask_count: r.subtask_count,
        }
    }
}

/// Session row with counters joined in.
const SESSION_SELECT: &str = r#"
    SELECT s.id, s.started_at, s.ended_at,
           (SELECT COUNT(*) FROM requests r WHERE r.session_id = s.id) AS request_count,
           (SELECT COUNT(*) FROM subtasks st
            JOIN task_lists tl ON tl.id = st.task_list_id
            JOIN requests r2 ON r2.id = tl.request_id
            WHERE r2.session_id = s.id) AS subtask_count
    FROM sessions s"#;

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn get_or_create(&self, id: &str, events: &[BusEvent]) -> DomainResult<(Session, bool)> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO sessions (id, started_at) VALUES ($1, now()) ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            notify_all(&mut tx, events).await?;
        }

        let row: SessionRow = sqlx::query_as(&format!("{SESSION_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok((row.into(), inserted))
    }

    async fn get(&self, id: &str) -> DomainResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!("{SESSION_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list(&self, active_only: bool) -> DomainResult<Vec<Session>> {
        let sql = if active_only {
            format!("{SESSION_SELECT} WHERE s.ended_at IS NULL ORDER BY s.started_at DESC")
        } else {
            format!("{SESSION_SELECT} ORDER BY s.started_at DESC")
        };
        let rows: Vec<SessionRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn end(&self, id: &str, events: &[BusEvent]) -> DomainResult<Option<Session>> {
        let mut tx = self.pool.begin().await?;

        let ended = sqlx::query("UPDATE sessions SET ended_at = now() WHERE id = $1 AND ended_at IS NULL")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if ended {
            notify_all(&mut tx, events).await?;
        }

        let row: Option<SessionRow> = sqlx::query_as(&format!("{SESSION_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.map(Into::into))
    }

    async fn stats(&self) -> DomainResult<SessionStats> {
        let row: (i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"SELECT
                   (SELECT COUNT(*) FROM sessions),
                   (SELECT COUNT(*) FROM sessions WHERE ended_at IS NULL),
                   (SELECT COUNT(*) FROM requests),
                   (SELECT COUNT(*) FROM subtasks),
                   (SELECT COUNT(*) FROM subtasks WHERE status = 'completed'),
                   (SELECT COUNT(*) FROM subtasks WHERE status = 'failed')"#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(SessionStats {
            total_sessions: row.0,
            active_sessions: row.1,
            total_requests: row.2,
            total_subtasks: row.3,
            completed_subtasks: row.4,
            failed_subtasks: row.5,
        })
    }

    async fn close_orphaned(
        &self,
        started_before: DateTime<Utc>,
        inactive_since: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let result = sqlx::query(
            r#"UPDATE sessions SET ended_at = now()
               WHERE ended_at IS NULL
                 AND started_at < $1
                 AND NOT EXISTS (
                     SELECT 1 FROM actions a
                     JOIN subtasks st ON st.id = a.subtask_id
                     JOIN task_lists tl ON tl.id = st.task_list_id
                     JOIN requests r ON r.id = tl.request_id
                     WHERE r.session_id = sessions.id AND a.created_at > $2
                 )"#,
        )
        .bind(started_before)
        .bind(inactive_since)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn active_agents(&self) -> DomainResult<Vec<ActiveAgent>> {
        let rows: Vec<ActiveAgentRow> = sqlx::query_as(
            r#"SELECT st.agent_id, MAX(st.agent_type) AS agent_type, r.session_id,
                      COUNT(*) AS running_subtasks,
                      MAX(a.created_at) AS last_action_at
               FROM subtasks st
               JOIN task_lists tl ON tl.id = st.task_list_id
               JOIN requests r ON r.id = tl.request_id
               LEFT JOIN actions a ON a.subtask_id = st.id
               WHERE st.status = 'running' AND st.agent_id IS NOT NULL
               GROUP BY st.agent_id, r.session_id
               ORDER BY st.agent_id"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ActiveAgent {
                agent_id: r.agent_id,
                agent_type: r.agent_type,
                session_id: r.session_id,
                running_subtasks: r.running_subtasks,
                last_action_at: r.last_action_at,
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct ActiveAgentRow {
    agent_id: String,
    agent_type: Option<String>,
    session_id: String,
    running_subtasks: i64,
    last_action_at: Option<DateTime<Utc>>,
}
