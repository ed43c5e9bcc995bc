//! Postgres implementation of the CapacityRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::adapters::postgres::notify::notify_all;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentCapacity, BusEvent, CapacityZone};
use crate::domain::ports::CapacityRepository;

#[derive(Clone)]
pub struct PgCapacityRepository {
    pool: PgPool,
}

impl PgCapacityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CapacityRow {
    agent_id: String,
    current_usage: i64,
    max_capacity: i64,
    zone: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CapacityRow> for AgentCapacity {
    type Error = DomainError;

    fn try_from(r: CapacityRow) -> Result<Self, Self::Error> {
        let zone = CapacityZone::from_str(&r.zone)
            .ok_or_else(|| DomainError::Serialization(format!("bad capacity zone: {}", r.zone)))?;
        Ok(AgentCapacity {
            agent_id: r.agent_id,
            current_usage: r.current_usage,
            max_capacity: r.max_capacity,
            zone,
            updated_at: r.updated_at,
        })
    }
}

#[async_trait]
impl CapacityRepository for PgCapacityRepository {
    async fn get(&self, agent_id: &str) -> DomainResult<Option<AgentCapacity>> {
        let row: Option<CapacityRow> = sqlx::query_as(
            "SELECT agent_id, current_usage, max_capacity, zone, updated_at FROM agent_capacity WHERE agent_id = $1",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn upsert(&self, capacity: &AgentCapacity, events: &[BusEvent]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO agent_capacity (agent_id, current_usage, max_capacity, zone, updated_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (agent_id) DO UPDATE SET
                   current_usage = EXCLUDED.current_usage,
                   max_capacity = EXCLUDED.max_capacity,
                   zone = EXCLUDED.zone,
                   updated_at = EXCLUDED.updated_at"#,
        )
        .bind(&capacity.agent_id)
        .bind(capacity.current_usage)
        .bind(capacity.max_capacity)
        .bind(capacity.zone.as_str())
        .bind(capacity.updated_at)
        .execute(&mut *tx)
        .await?;
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<AgentCapacity>> {
        let rows: Vec<CapacityRow> = sqlx::query_as(
            "SELECT agent_id, current_usage, max_capacity, zone, updated_at FROM agent_capacity ORDER BY agent_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
