//! Postgres implementation of the SubscriptionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::TopicSubscription;
use crate::domain::ports::SubscriptionRepository;

#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    agent_id: String,
    channel: String,
    created_at: DateTime<Utc>,
}

impl From<SubscriptionRow> for TopicSubscription {
    fn from(r: SubscriptionRow) -> Self {
        TopicSubscription {
            id: r.id,
            agent_id: r.agent_id,
            channel: r.channel,
            created_at: r.created_at,
        }
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn add(&self, agent_id: &str, channel: &str) -> DomainResult<TopicSubscription> {
        let row: SubscriptionRow = sqlx::query_as(
            r#"INSERT INTO topic_subscriptions (id, agent_id, channel)
               VALUES ($1, $2, $3)
               ON CONFLICT (agent_id, channel) DO UPDATE SET agent_id = EXCLUDED.agent_id
               RETURNING id, agent_id, channel, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(agent_id)
        .bind(channel)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn remove(&self, agent_id: &str, channel: &str) -> DomainResult<u64> {
        let result =
            sqlx::query("DELETE FROM topic_subscriptions WHERE agent_id = $1 AND channel = $2")
                .bind(agent_id)
                .bind(channel)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn list_for_agent(&self, agent_id: &str) -> DomainResult<Vec<TopicSubscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            r#"SELECT id, agent_id, channel, created_at FROM topic_subscriptions
               WHERE agent_id = $1 ORDER BY created_at"#,
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
