//! Postgres implementation of the RequestRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::adapters::postgres::notify::notify_all;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BusEvent, Request, RequestStatus};
use crate::domain::ports::RequestRepository;

#[derive(Clone)]
pub struct PgRequestRepository {
    pool: PgPool,
}

impl PgRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    project_id: Uuid,
    session_id: String,
    prompt: String,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<RequestRow> for Request {
    type Error = DomainError;

    fn try_from(r: RequestRow) -> Result<Self, Self::Error> {
        let status = RequestStatus::from_str(&r.status)
            .ok_or_else(|| DomainError::Serialization(format!("bad request status: {}", r.status)))?;
        Ok(Request {
            id: r.id,
            project_id: r.project_id,
            session_id: r.session_id,
            prompt: r.prompt,
            status,
            created_at: r.created_at,
            completed_at: r.completed_at,
        })
    }
}

const COLUMNS: &str = "id, project_id, session_id, prompt, status, created_at, completed_at";

#[async_trait]
impl RequestRepository for PgRequestRepository {
    async fn create(&self, request: &Request, events: &[BusEvent]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO requests (id, project_id, session_id, prompt, status, created_at, completed_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(request.id)
        .bind(request.project_id)
        .bind(&request.session_id)
        .bind(&request.prompt)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.completed_at)
        .execute(&mut *tx)
        .await?;
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Request>> {
        let row: Option<RequestRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM requests WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_by_project(&self, project_id: Uuid) -> DomainResult<Vec<Request>> {
        let rows: Vec<RequestRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM requests WHERE project_id = $1 ORDER BY created_at"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_session(&self, session_id: &str) -> DomainResult<Vec<Request>> {
        let rows: Vec<RequestRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM requests WHERE session_id = $1 ORDER BY created_at"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: RequestStatus,
        completed_at: Option<DateTime<Utc>>,
        events: &[BusEvent],
    ) -> DomainResult<Request> {
        let mut tx = self.pool.begin().await?;
        let row: Option<RequestRow> = sqlx::query_as(&format!(
            r#"UPDATE requests SET status = $2, completed_at = $3
               WHERE id = $1
               RETURNING {COLUMNS}"#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(completed_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(DomainError::not_found("request", id));
        };
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn delete(&self, id: Uuid, events: &[BusEvent]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM requests WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("request", id));
        }
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        Ok(())
    }
}
