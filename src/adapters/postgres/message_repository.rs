//! Postgres implementation of the MessageRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::adapters::postgres::notify::{notify_all, notify_event};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentMessage, BusEvent, EventName, MessageTopic};
use crate::domain::ports::{MessageFilter, MessageRepository};
use crate::gateway::channels::GLOBAL_CHANNEL;

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    from_agent: String,
    to_agent: Option<String>,
    topic: String,
    content: serde_json::Value,
    priority: i32,
    read_by: Vec<String>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<MessageRow> for AgentMessage {
    type Error = DomainError;

    fn try_from(r: MessageRow) -> Result<Self, Self::Error> {
        let topic = MessageTopic::from_str(&r.topic)
            .ok_or_else(|| DomainError::Serialization(format!("bad message topic: {}", r.topic)))?;
        Ok(AgentMessage {
            id: r.id,
            from_agent: r.from_agent,
            to_agent: r.to_agent,
            topic,
            content: r.content,
            priority: r.priority,
            read_by: r.read_by,
            created_at: r.created_at,
            expires_at: r.expires_at,
        })
    }
}

const COLUMNS: &str =
    "id, from_agent, to_agent, topic, content, priority, read_by, created_at, expires_at";

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: &AgentMessage, events: &[BusEvent]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO agent_messages
               (id, from_agent, to_agent, topic, content, priority, read_by, created_at, expires_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(message.id)
        .bind(&message.from_agent)
        .bind(&message.to_agent)
        .bind(message.topic.as_str())
        .bind(&message.content)
        .bind(message.priority)
        .bind(&message.read_by)
        .bind(message.created_at)
        .bind(message.expires_at)
        .execute(&mut *tx)
        .await?;
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<AgentMessage>> {
        let row: Option<MessageRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM agent_messages WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn visible_to(
        &self,
        agent_id: &str,
        filter: MessageFilter,
    ) -> DomainResult<Vec<AgentMessage>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM agent_messages WHERE "));

        if filter.include_broadcasts {
            builder
                .push("(to_agent = ")
                .push_bind(agent_id.to_string())
                .push(" OR to_agent IS NULL)");
        } else {
            builder.push("to_agent = ").push_bind(agent_id.to_string());
        }
        builder.push(" AND (expires_at IS NULL OR expires_at > now())");

        if let Some(topic) = filter.topic {
            builder.push(" AND topic = ").push_bind(topic.as_str());
        }
        if let Some(since) = filter.since {
            builder.push(" AND created_at >= ").push_bind(since);
        }
        builder.push(" ORDER BY created_at DESC");
        builder.push(" LIMIT ").push_bind(filter.limit);

        let rows: Vec<MessageRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn mark_read(
        &self,
        message_id: Uuid,
        agent_id: &str,
        events: &[BusEvent],
    ) -> DomainResult<bool> {
        let mut tx = self.pool.begin().await?;

        // array_append is gated on absence, so re-reads are no-ops and the
        // rows_affected count distinguishes first reads.
        let result = sqlx::query(
            r#"UPDATE agent_messages
               SET read_by = array_append(read_by, $2)
               WHERE id = $1 AND NOT ($2 = ANY(read_by))"#,
        )
        .bind(message_id)
        .bind(agent_id)
        .execute(&mut *tx)
        .await?;

        let newly_read = result.rows_affected() > 0;
        if newly_read {
            notify_all(&mut tx, events).await?;
        } else {
            // Distinguish "already read" from "no such message".
            let exists: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM agent_messages WHERE id = $1")
                    .bind(message_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if exists.is_none() {
                return Err(DomainError::not_found("message", message_id));
            }
        }
        tx.commit().await?;
        Ok(newly_read)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let mut tx = self.pool.begin().await?;
        let result =
            sqlx::query("DELETE FROM agent_messages WHERE expires_at IS NOT NULL AND expires_at < $1")
                .bind(now)
                .execute(&mut *tx)
                .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            notify_event(
                &mut *tx,
                &BusEvent::new(
                    GLOBAL_CHANNEL,
                    EventName::MessageExpired,
                    serde_json::json!({ "count": removed }),
                ),
            )
            .await?;
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn delete_read_broadcasts(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        let result = sqlx::query(
            r#"DELETE FROM agent_messages
               WHERE to_agent IS NULL
                 AND cardinality(read_by) > 0
                 AND created_at < $1"#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
