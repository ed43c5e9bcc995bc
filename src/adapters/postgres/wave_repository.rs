//! Postgres implementation of the WaveRepository.
//!
//! Counter updates and transitions are single `UPDATE .. RETURNING`
//! statements; concurrent callers serialize on the row lock and decide from
//! the returned row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::adapters::postgres::notify::notify_all;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BusEvent, OrchestrationBatch, WaveState, WaveStatus};
use crate::domain::ports::WaveRepository;

#[derive(Clone)]
pub struct PgWaveRepository {
    pool: PgPool,
}

impl PgWaveRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct WaveRow {
    id: Uuid,
    session_id: String,
    wave_number: i32,
    total_tasks: i32,
    completed_tasks: i32,
    failed_tasks: i32,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<WaveRow> for WaveState {
    type Error = DomainError;

    fn try_from(r: WaveRow) -> Result<Self, Self::Error> {
        let status = WaveStatus::from_str(&r.status)
            .ok_or_else(|| DomainError::Serialization(format!("bad wave status: {}", r.status)))?;
        Ok(WaveState {
            id: r.id,
            session_id: r.session_id,
            wave_number: r.wave_number,
            total_tasks: r.total_tasks,
            completed_tasks: r.completed_tasks,
            failed_tasks: r.failed_tasks,
            status,
            started_at: r.started_at,
            completed_at: r.completed_at,
        })
    }
}

const COLUMNS: &str = "id, session_id, wave_number, total_tasks, completed_tasks, failed_tasks, \
                       status, started_at, completed_at";

#[derive(sqlx::FromRow)]
struct BatchRow {
    id: Uuid,
    session_id: String,
    wave_number: i32,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    synthesis: Option<serde_json::Value>,
}

#[async_trait]
impl WaveRepository for PgWaveRepository {
    async fn get_or_create(&self, session_id: &str, wave_number: i32) -> DomainResult<WaveState> {
        let row: WaveRow = sqlx::query_as(&format!(
            r#"INSERT INTO wave_states (id, session_id, wave_number, status)
               VALUES ($1, $2, $3, 'pending')
               ON CONFLICT (session_id, wave_number) DO UPDATE SET session_id = EXCLUDED.session_id
               RETURNING {COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(wave_number)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get(&self, session_id: &str, wave_number: i32) -> DomainResult<Option<WaveState>> {
        let row: Option<WaveRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM wave_states WHERE session_id = $1 AND wave_number = $2"
        ))
        .bind(session_id)
        .bind(wave_number)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn start(
        &self,
        session_id: &str,
        wave_number: i32,
        events: &[BusEvent],
    ) -> DomainResult<WaveState> {
        let mut tx = self.pool.begin().await?;

        let row: Option<WaveRow> = sqlx::query_as(&format!(
            r#"UPDATE wave_states
               SET status = 'running', started_at = COALESCE(started_at, now())
               WHERE session_id = $1 AND wave_number = $2 AND status = 'pending'
               RETURNING {COLUMNS}"#
        ))
        .bind(session_id)
        .bind(wave_number)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match row {
            Some(row) => {
                notify_all(&mut tx, events).await?;
                row
            }
            // Already started (idempotent) or missing entirely.
            None => {
                let existing: Option<WaveRow> = sqlx::query_as(&format!(
                    "SELECT {COLUMNS} FROM wave_states WHERE session_id = $1 AND wave_number = $2"
                ))
                .bind(session_id)
                .bind(wave_number)
                .fetch_optional(&mut *tx)
                .await?;
                match existing {
                    Some(row) if row.status == "running" => row,
                    Some(row) => {
                        return Err(DomainError::Conflict(format!(
                            "wave {wave_number} for session {session_id} is {} and cannot start",
                            row.status
                        )))
                    }
                    None => {
                        return Err(DomainError::not_found(
                            "wave_state",
                            format!("{session_id}/{wave_number}"),
                        ))
                    }
                }
            }
        };

        tx.commit().await?;
        row.try_into()
    }

    async fn increment_task(
        &self,
        session_id: &str,
        wave_number: i32,
        failed: bool,
    ) -> DomainResult<WaveState> {
        let row: Option<WaveRow> = sqlx::query_as(&format!(
            r#"UPDATE wave_states
               SET completed_tasks = completed_tasks + CASE WHEN $3 THEN 0 ELSE 1 END,
                   failed_tasks = failed_tasks + CASE WHEN $3 THEN 1 ELSE 0 END
               WHERE session_id = $1 AND wave_number = $2
               RETURNING {COLUMNS}"#
        ))
        .bind(session_id)
        .bind(wave_number)
        .bind(failed)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| {
            DomainError::not_found("wave_state", format!("{session_id}/{wave_number}"))
        })?
        .try_into()
    }

    async fn finalize(
        &self,
        session_id: &str,
        wave_number: i32,
        status: WaveStatus,
        completed_at: DateTime<Utc>,
        events: &[BusEvent],
    ) -> DomainResult<Option<WaveState>> {
        let mut tx = self.pool.begin().await?;
        let row: Option<WaveRow> = sqlx::query_as(&format!(
            r#"UPDATE wave_states
               SET status = $3, completed_at = $4
               WHERE session_id = $1 AND wave_number = $2 AND status = 'running'
               RETURNING {COLUMNS}"#
        ))
        .bind(session_id)
        .bind(wave_number)
        .bind(status.as_str())
        .bind(completed_at)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(finalized) = &row {
            // Open batches for this wave close with a synthesis of the
            // final counters.
            sqlx::query(
                r#"UPDATE orchestration_batches
                   SET completed_at = $3,
                       synthesis = jsonb_build_object(
                           'status', $4::TEXT,
                           'total_tasks', $5::INT,
                           'completed_tasks', $6::INT,
                           'failed_tasks', $7::INT
                       )
                   WHERE session_id = $1 AND wave_number = $2 AND completed_at IS NULL"#,
            )
            .bind(session_id)
            .bind(wave_number)
            .bind(completed_at)
            .bind(status.as_str())
            .bind(finalized.total_tasks)
            .bind(finalized.completed_tasks)
            .bind(finalized.failed_tasks)
            .execute(&mut *tx)
            .await?;

            notify_all(&mut tx, events).await?;
        }
        tx.commit().await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn batches(&self, session_id: &str) -> DomainResult<Vec<OrchestrationBatch>> {
        let rows: Vec<BatchRow> = sqlx::query_as(
            r#"SELECT id, session_id, wave_number, created_at, completed_at, synthesis
               FROM orchestration_batches
               WHERE session_id = $1
               ORDER BY wave_number, created_at"#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| OrchestrationBatch {
                id: r.id,
                session_id: r.session_id,
                wave_number: r.wave_number,
                created_at: r.created_at,
                completed_at: r.completed_at,
                synthesis: r.synthesis,
            })
            .collect())
    }

    async fn all_prior_terminal(&self, session_id: &str, wave_number: i32) -> DomainResult<bool> {
        let row: (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM wave_states
               WHERE session_id = $1 AND wave_number < $2
                 AND status NOT IN ('completed', 'failed')"#,
        )
        .bind(session_id)
        .bind(wave_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 == 0)
    }

    async fn latest_completed(&self, session_id: &str) -> DomainResult<Option<WaveState>> {
        let row: Option<WaveRow> = sqlx::query_as(&format!(
            r#"SELECT {COLUMNS} FROM wave_states
               WHERE session_id = $1 AND status = 'completed'
               ORDER BY wave_number DESC LIMIT 1"#
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn current(&self, session_id: &str) -> DomainResult<Option<WaveState>> {
        // The running wave wins; otherwise the latest pending wave.
        let row: Option<WaveRow> = sqlx::query_as(&format!(
            r#"SELECT {COLUMNS} FROM wave_states
               WHERE session_id = $1 AND status IN ('running', 'pending')
               ORDER BY (status = 'running') DESC, wave_number DESC
               LIMIT 1"#
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn history(&self, session_id: &str) -> DomainResult<Vec<WaveState>> {
        let rows: Vec<WaveRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM wave_states WHERE session_id = $1 ORDER BY wave_number"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
