//! Project domain service.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BusEvent, EventName, Project};
use crate::domain::ports::{ProjectHierarchy, ProjectRepository};
use crate::gateway::channels::GLOBAL_CHANNEL;

/// Input for project creation / upsert.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PostProject {
    pub path: String,
    pub name: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

pub struct ProjectService {
    projects: Arc<dyn ProjectRepository>,
}

impl ProjectService {
    pub fn new(projects: Arc<dyn ProjectRepository>) -> Self {
        Self { projects }
    }

    /// Upsert by canonical path: posting the same path twice returns the
    /// same project.
    pub async fn post_project(&self, input: PostProject) -> DomainResult<Project> {
        let path = input.path.trim();
        if path.is_empty() {
            return Err(DomainError::validation("path", "must not be empty"));
        }

        let name = input
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| {
                path.rsplit('/')
                    .find(|segment| !segment.is_empty())
                    .unwrap_or(path)
                    .to_string()
            });

        let mut project = Project::new(path, name);
        if let Some(metadata) = input.metadata {
            if !metadata.is_object() {
                return Err(DomainError::validation("metadata", "must be an object"));
            }
            project.metadata = metadata;
        }

        let events = [BusEvent::new(
            GLOBAL_CHANNEL,
            EventName::SystemInfo,
            serde_json::json!({ "message": "project registered", "path": project.path }),
        )];
        self.projects.upsert_by_path(&project, &events).await
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Project> {
        self.projects
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("project", id))
    }

    pub async fn get_by_path(&self, path: &str) -> DomainResult<Option<Project>> {
        self.projects.get_by_path(path).await
    }

    pub async fn list(&self) -> DomainResult<Vec<Project>> {
        self.projects.list().await
    }

    pub async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let events = [BusEvent::new(
            GLOBAL_CHANNEL,
            EventName::SystemInfo,
            serde_json::json!({ "message": "project deleted", "id": id }),
        )];
        self.projects.delete(id, &events).await
    }

    /// The full joined tree for the dashboard.
    pub async fn hierarchy(&self, project_id: Uuid) -> DomainResult<ProjectHierarchy> {
        self.projects
            .hierarchy(project_id)
            .await?
            .ok_or_else(|| DomainError::not_found("project", project_id))
    }
}
