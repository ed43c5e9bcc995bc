//! Postgres implementation of the TaskListRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::adapters::postgres::notify::notify_all;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BusEvent, TaskList, TaskListStatus};
use crate::domain::ports::{TaskListRepository, WaveAggregate};

#[derive(Clone)]
pub struct PgTaskListRepository {
    pool: PgPool,
}

impl PgTaskListRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TaskListRow {
    id: Uuid,
    request_id: Uuid,
    wave_number: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TaskListRow> for TaskList {
    type Error = DomainError;

    fn try_from(r: TaskListRow) -> Result<Self, Self::Error> {
        let status = TaskListStatus::from_str(&r.status)
            .ok_or_else(|| DomainError::Serialization(format!("bad task list status: {}", r.status)))?;
        Ok(TaskList {
            id: r.id,
            request_id: r.request_id,
            wave_number: r.wave_number,
            status,
            created_at: r.created_at,
        })
    }
}

#[async_trait]
impl TaskListRepository for PgTaskListRepository {
    async fn get_or_create(&self, task_list: &TaskList, events: &[BusEvent]) -> DomainResult<TaskList> {
        let mut tx = self.pool.begin().await?;
        let row: TaskListRow = sqlx::query_as(
            r#"INSERT INTO task_lists (id, request_id, wave_number, status, created_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (request_id, wave_number) DO UPDATE SET request_id = EXCLUDED.request_id
               RETURNING id, request_id, wave_number, status, created_at"#,
        )
        .bind(task_list.id)
        .bind(task_list.request_id)
        .bind(task_list.wave_number)
        .bind(task_list.status.as_str())
        .bind(task_list.created_at)
        .fetch_one(&mut *tx)
        .await?;

        if row.id == task_list.id {
            notify_all(&mut tx, events).await?;
        }
        tx.commit().await?;
        row.try_into()
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<TaskList>> {
        let row: Option<TaskListRow> = sqlx::query_as(
            "SELECT id, request_id, wave_number, status, created_at FROM task_lists WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_by_request(&self, request_id: Uuid) -> DomainResult<Vec<TaskList>> {
        let rows: Vec<TaskListRow> = sqlx::query_as(
            r#"SELECT id, request_id, wave_number, status, created_at
               FROM task_lists WHERE request_id = $1 ORDER BY wave_number"#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TaskListStatus,
        events: &[BusEvent],
    ) -> DomainResult<TaskList> {
        let mut tx = self.pool.begin().await?;
        let row: Option<TaskListRow> = sqlx::query_as(
            r#"UPDATE task_lists SET status = $2
               WHERE id = $1
               RETURNING id, request_id, wave_number, status, created_at"#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(DomainError::not_found("task_list", id));
        };
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn delete(&self, id: Uuid, events: &[BusEvent]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM task_lists WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("task_list", id));
        }
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn session_wave_aggregates(&self, session_id: &str) -> DomainResult<Vec<WaveAggregate>> {
        let rows: Vec<AggregateRow> = sqlx::query_as(
            r#"SELECT tl.wave_number,
                      COUNT(s.id)::INT AS total_tasks,
                      COUNT(s.id) FILTER (WHERE s.status = 'completed')::INT AS completed_tasks,
                      COUNT(s.id) FILTER (WHERE s.status = 'failed')::INT AS failed_tasks,
                      MIN(s.started_at) AS earliest_started,
                      MAX(s.completed_at) AS latest_completed
               FROM task_lists tl
               JOIN requests r ON r.id = tl.request_id
               LEFT JOIN subtasks s ON s.task_list_id = tl.id
               WHERE r.session_id = $1
               GROUP BY tl.wave_number
               ORDER BY tl.wave_number"#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| WaveAggregate {
                wave_number: r.wave_number,
                total_tasks: r.total_tasks,
                completed_tasks: r.completed_tasks,
                failed_tasks: r.failed_tasks,
                earliest_started: r.earliest_started,
                latest_completed: r.latest_completed,
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct AggregateRow {
    wave_number: i32,
    total_tasks: i32,
    completed_tasks: i32,
    failed_tasks: i32,
    earliest_started: Option<DateTime<Utc>>,
    latest_completed: Option<DateTime<Utc>>,
}
