//! Project repository port.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BusEvent, Project, Request, Subtask, TaskList};

/// Fully-joined project tree, produced by a single statement.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectHierarchy {
    pub project: Project,
    pub requests: Vec<RequestNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestNode {
    pub request: Request,
    pub task_lists: Vec<TaskListNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskListNode {
    pub task_list: TaskList,
    pub subtasks: Vec<Subtask>,
}

/// Repository interface for Project persistence.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Insert the project, or return the existing row when the path is
    /// already registered (idempotent upsert by path).
    async fn upsert_by_path(&self, project: &Project, events: &[BusEvent]) -> DomainResult<Project>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Project>>;

    async fn get_by_path(&self, path: &str) -> DomainResult<Option<Project>>;

    async fn list(&self) -> DomainResult<Vec<Project>>;

    /// Delete the project and, via cascade, everything it owns.
    async fn delete(&self, id: Uuid, events: &[BusEvent]) -> DomainResult<()>;

    /// Fetch the full project tree with one joined statement (no N+1).
    async fn hierarchy(&self, project_id: Uuid) -> DomainResult<Option<ProjectHierarchy>>;
}
