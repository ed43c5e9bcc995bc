//! Postgres implementation of the ProjectRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::adapters::postgres::notify::notify_all;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BusEvent, Project, Request, RequestStatus, Subtask, SubtaskStatus, TaskList, TaskListStatus};
use crate::domain::ports::{ProjectHierarchy, ProjectRepository, RequestNode, TaskListNode};

#[derive(Clone)]
pub struct PgProjectRepository {
    pool: PgPool,
}

impl PgProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    path: String,
    name: String,
    metadata: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ProjectRow> for Project {
    fn from(r: ProjectRow) -> Self {
        Project {
            id: r.id,
            path: r.path,
            name: r.name,
            metadata: r.metadata,
            created_at: r.created_at,
        }
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    async fn upsert_by_path(&self, project: &Project, events: &[BusEvent]) -> DomainResult<Project> {
        let mut tx = self.pool.begin().await?;

        // Upsert by path: the DO UPDATE is a no-op write so RETURNING always
        // yields the surviving row.
        let row: ProjectRow = sqlx::query_as(
            r#"INSERT INTO projects (id, path, name, metadata, created_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (path) DO UPDATE SET path = EXCLUDED.path
               RETURNING id, path, name, metadata, created_at"#,
        )
        .bind(project.id)
        .bind(&project.path)
        .bind(&project.name)
        .bind(&project.metadata)
        .bind(project.created_at)
        .fetch_one(&mut *tx)
        .await?;

        // Only a fresh insert announces itself.
        if row.id == project.id {
            notify_all(&mut tx, events).await?;
        }
        tx.commit().await?;

        Ok(row.into())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(
            "SELECT id, path, name, metadata, created_at FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get_by_path(&self, path: &str) -> DomainResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(
            "SELECT id, path, name, metadata, created_at FROM projects WHERE path = $1",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list(&self) -> DomainResult<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            "SELECT id, path, name, metadata, created_at FROM projects ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, id: Uuid, events: &[BusEvent]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("project", id));
        }
        notify_all(&mut tx, events).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn hierarchy(&self, project_id: Uuid) -> DomainResult<Option<ProjectHierarchy>> {
        let Some(project) = self.get(project_id).await? else {
            return Ok(None);
        };

        // One joined statement for the whole tree; assembled in memory.
        let rows: Vec<HierarchyRow> = sqlx::query_as(
            r#"SELECT
                   r.id AS request_id, r.session_id, r.prompt, r.status AS request_status,
                   r.created_at AS request_created_at, r.completed_at AS request_completed_at,
                   tl.id AS task_list_id, tl.wave_number, tl.status AS task_list_status,
                   tl.created_at AS task_list_created_at,
                   s.id AS subtask_id, s.description, s.status AS subtask_status,
                   s.agent_type, s.agent_id, s.priority, s.retry_count, s.blocked_by,
                   s.parent_agent, s.batch_id, s.created_at AS subtask_created_at,
                   s.started_at, s.completed_at AS subtask_completed_at, s.result
               FROM requests r
               LEFT JOIN task_lists tl ON tl.request_id = r.id
               LEFT JOIN subtasks s ON s.task_list_id = tl.id
               WHERE r.project_id = $1
               ORDER BY r.created_at, tl.wave_number, s.created_at"#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let mut requests: Vec<RequestNode> = Vec::new();
        for row in rows {
            if requests.last().map(|n| n.request.id) != Some(row.request_id) {
                requests.push(RequestNode {
                    request: row.request(project_id)?,
                    task_lists: Vec::new(),
                });
            }
            let Some(request_node) = requests.last_mut() else {
                continue;
            };

            let Some(task_list_id) = row.task_list_id else {
                continue;
            };
            if request_node.task_lists.last().map(|n| n.task_list.id) != Some(task_list_id) {
                request_node.task_lists.push(TaskListNode {
                    task_list: row.task_list(row.request_id)?,
                    subtasks: Vec::new(),
                });
            }
            let Some(list_node) = request_node.task_lists.last_mut() else {
                continue;
            };

            if row.subtask_id.is_some() {
                list_node.subtasks.push(row.subtask(task_list_id)?);
            }
        }

        Ok(Some(ProjectHierarchy { project, requests }))
    }
}

#[derive(sqlx::FromRow)]
struct HierarchyRow {
    request_id: Uuid,
    session_id: String,
    prompt: String,
    request_status: String,
    request_created_at: chrono::DateTime<chrono::Utc>,
    request_completed_at: Option<chrono::DateTime<chrono::Utc>>,
    task_list_id: Option<Uuid>,
    wave_number: Option<i32>,
    task_list_status: Option<String>,
    task_list_created_at: Option<chrono::DateTime<chrono::Utc>>,
    subtask_id: Option<Uuid>,
    description: Option<String>,
    subtask_status: Option<String>,
    agent_type: Option<String>,
    agent_id: Option<String>,
    priority: Option<i32>,
    retry_count: Option<i32>,
    blocked_by: Option<Vec<Uuid>>,
    parent_agent: Option<String>,
    batch_id: Option<Uuid>,
    subtask_created_at: Option<chrono::DateTime<chrono::Utc>>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    subtask_completed_at: Option<chrono::DateTime<chrono::Utc>>,
    result: Option<serde_json::Value>,
}

impl HierarchyRow {
    fn request(&self, project_id: Uuid) -> DomainResult<Request> {
        Ok(Request {
            id: self.request_id,
            project_id,
            session_id: self.session_id.clone(),
            prompt: self.prompt.clone(),
            status: RequestStatus::from_str(&self.request_status)
                .ok_or_else(|| DomainError::Serialization(format!("bad request status: {}", self.request_status)))?,
            created_at: self.request_created_at,
            completed_at: self.request_completed_at,
        })
    }

    fn task_list(&self, request_id: Uuid) -> DomainResult<TaskList> {
        Ok(TaskList {
            id: self
                .task_list_id
                .ok_or_else(|| DomainError::Serialization("task list missing id".into()))?,
            request_id,
            wave_number: self.wave_number.unwrap_or(0),
            status: self
                .task_list_status
                .as_deref()
                .and_then(TaskListStatus::from_str)
                .ok_or_else(|| DomainError::Serialization("bad task list status".into()))?,
            created_at: self
                .task_list_created_at
                .ok_or_else(|| DomainError::Serialization("task list missing created_at".into()))?,
        })
    }

    fn subtask(&self, task_list_id: Uuid) -> DomainResult<Subtask> {
        Ok(Subtask {
            id: self
                .subtask_id
                .ok_or_else(|| DomainError::Serialization("subtask missing id".into()))?,
            task_list_id,
            description: self.description.clone().unwrap_or_default(),
            status: self
                .subtask_status
                .as_deref()
                .and_then(SubtaskStatus::from_str)
                .ok_or_else(|| DomainError::Serialization("bad subtask status".into()))?,
            agent_type: self.agent_type.clone(),
            agent_id: self.agent_id.clone(),
            priority: self.priority.unwrap_or(5),
            retry_count: self.retry_count.unwrap_or(0),
            blocked_by: self.blocked_by.clone().unwrap_or_default(),
            parent_agent: self.parent_agent.clone(),
            batch_id: self.batch_id,
            created_at: self
                .subtask_created_at
                .ok_or_else(|| DomainError::Serialization("subtask missing created_at".into()))?,
            started_at: self.started_at,
            completed_at: self.subtask_completed_at,
            result: self.result.clone(),
        })
    }
}
