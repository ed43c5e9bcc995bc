//! Postgres implementation of the ActionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::adapters::postgres::notify::notify_all;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Action, BusEvent, HourlyActionCount, TokenConsumption, ToolKind};
use crate::domain::ports::ActionRepository;

#[derive(Clone)]
pub struct PgActionRepository {
    pool: PgPool,
}

impl PgActionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ActionRow {
    id: Uuid,
    subtask_id: Uuid,
    tool_name: String,
    tool_kind: String,
    input: Option<Vec<u8>>,
    output: Option<Vec<u8>>,
    exit_code: Option<i32>,
    duration_ms: Option<i64>,
    file_paths: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActionRow> for Action {
    type Error = DomainError;

    fn try_from(r: ActionRow) -> Result<Self, Self::Error> {
        let tool_kind = ToolKind::from_str(&r.tool_kind)
            .ok_or_else(|| DomainError::Serialization(format!("bad tool kind: {}", r.tool_kind)))?;
        Ok(Action {
            id: r.id,
            subtask_id: r.subtask_id,
            tool_name: r.tool_name,
            tool_kind,
            input: r.input,
            output: r.output,
            exit_code: r.exit_code,
            duration_ms: r.duration_ms,
            file_paths: r.file_paths,
            created_at: r.created_at,
        })
    }
}

const COLUMNS: &str = "id, subtask_id, tool_name, tool_kind, input, output, exit_code, \
                       duration_ms, file_paths, created_at";

#[async_trait]
impl ActionRepository for PgActionRepository {
    async fn create(&self, action: &Action, events: &[BusEvent]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO actions (id, subtask_id, tool_name, tool_kind, input, output,
               exit_code, duration_ms, file_paths, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(action.id)
        .bind(action.subtask_id)
        .bind(&action.tool_name)
        .bind(action.tool_kind.as_str())
        .bind(&action.input)
        .bind(&action.output)
        .bind(action.exit_code)
        .bind(action.duration_ms)
        .bind(&action.file_paths)
        .bind(action.created_at)
        .execute(&mut *tx)
        .await?;
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Action>> {
        let row: Option<ActionRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM actions WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_by_subtask(&self, subtask_id: Uuid, limit: i64) -> DomainResult<Vec<Action>> {
        let rows: Vec<ActionRow> = sqlx::query_as(&format!(
            r#"SELECT {COLUMNS} FROM actions
               WHERE subtask_id = $1 ORDER BY created_at DESC LIMIT $2"#
        ))
        .bind(subtask_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn hourly(&self, since: DateTime<Utc>) -> DomainResult<Vec<HourlyActionCount>> {
        let rows: Vec<(DateTime<Utc>, i64, Option<f64>)> = sqlx::query_as(
            r#"SELECT date_trunc('hour', created_at) AS hour,
                      COUNT(*) AS count,
                      AVG(duration_ms)::FLOAT8 AS avg_duration_ms
               FROM actions
               WHERE created_at >= $1
               GROUP BY 1
               ORDER BY 1"#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(hour, count, avg_duration_ms)| HourlyActionCount {
                hour,
                count,
                avg_duration_ms,
            })
            .collect())
    }

    async fn record_tokens(&self, row: &TokenConsumption) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO token_consumption
               (id, agent_id, session_id, action_id, input_tokens, output_tokens, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(row.id)
        .bind(&row.agent_id)
        .bind(&row.session_id)
        .bind(row.action_id)
        .bind(row.input_tokens)
        .bind(row.output_tokens)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
