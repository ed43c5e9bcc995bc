//! Postgres implementation of the BlockingRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::adapters::postgres::notify::notify_all;
use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentBlocking, BusEvent};
use crate::domain::ports::BlockingRepository;

#[derive(Clone)]
pub struct PgBlockingRepository {
    pool: PgPool,
}

impl PgBlockingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BlockingRow {
    id: Uuid,
    blocker_agent: String,
    blocked_agent: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl From<BlockingRow> for AgentBlocking {
    fn from(r: BlockingRow) -> Self {
        AgentBlocking {
            id: r.id,
            blocker_agent: r.blocker_agent,
            blocked_agent: r.blocked_agent,
            reason: r.reason,
            created_at: r.created_at,
            resolved_at: r.resolved_at,
        }
    }
}

const COLUMNS: &str = "id, blocker_agent, blocked_agent, reason, created_at, resolved_at";

#[async_trait]
impl BlockingRepository for PgBlockingRepository {
    async fn find_open(
        &self,
        blocker: &str,
        blocked: &str,
    ) -> DomainResult<Option<AgentBlocking>> {
        let row: Option<BlockingRow> = sqlx::query_as(&format!(
            r#"SELECT {COLUMNS} FROM agent_blockings
               WHERE blocker_agent = $1 AND blocked_agent = $2 AND resolved_at IS NULL
               LIMIT 1"#
        ))
        .bind(blocker)
        .bind(blocked)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn create(&self, blocking: &AgentBlocking, events: &[BusEvent]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO agent_blockings (id, blocker_agent, blocked_agent, reason, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(blocking.id)
        .bind(&blocking.blocker_agent)
        .bind(&blocking.blocked_agent)
        .bind(&blocking.reason)
        .bind(blocking.created_at)
        .execute(&mut *tx)
        .await?;
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn resolve_pair(
        &self,
        blocker: &str,
        blocked: &str,
        events: &[BusEvent],
    ) -> DomainResult<u64> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"UPDATE agent_blockings SET resolved_at = now()
               WHERE blocker_agent = $1 AND blocked_agent = $2 AND resolved_at IS NULL"#,
        )
        .bind(blocker)
        .bind(blocked)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            notify_all(&mut tx, events).await?;
        }
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn any_open_for(&self, blocked: &str) -> DomainResult<bool> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM agent_blockings WHERE blocked_agent = $1 AND resolved_at IS NULL)",
        )
        .bind(blocked)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn list_open(&self, agent_id: &str) -> DomainResult<Vec<AgentBlocking>> {
        let rows: Vec<BlockingRow> = sqlx::query_as(&format!(
            r#"SELECT {COLUMNS} FROM agent_blockings
               WHERE (blocked_agent = $1 OR blocker_agent = $1) AND resolved_at IS NULL
               ORDER BY created_at"#
        ))
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
