//! Postgres implementation of the RegistryRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::AgentRegistryEntry;
use crate::domain::ports::RegistryRepository;

#[derive(Clone)]
pub struct PgRegistryRepository {
    pool: PgPool,
}

impl PgRegistryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RegistryRow {
    id: Uuid,
    agent_type: String,
    category: Option<String>,
    allowed_tools: Vec<String>,
    forbidden_actions: Vec<String>,
    max_files: Option<i32>,
    wave_assignments: Vec<i32>,
    recommended_model: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RegistryRow> for AgentRegistryEntry {
    fn from(r: RegistryRow) -> Self {
        AgentRegistryEntry {
            id: r.id,
            agent_type: r.agent_type,
            category: r.category,
            allowed_tools: r.allowed_tools,
            forbidden_actions: r.forbidden_actions,
            max_files: r.max_files,
            wave_assignments: r.wave_assignments,
            recommended_model: r.recommended_model,
            created_at: r.created_at,
        }
    }
}

const COLUMNS: &str = "id, agent_type, category, allowed_tools, forbidden_actions, max_files, \
                       wave_assignments, recommended_model, created_at";

#[async_trait]
impl RegistryRepository for PgRegistryRepository {
    async fn upsert(&self, entry: &AgentRegistryEntry) -> DomainResult<AgentRegistryEntry> {
        let row: RegistryRow = sqlx::query_as(&format!(
            r#"INSERT INTO agent_registry
               (id, agent_type, category, allowed_tools, forbidden_actions, max_files,
                wave_assignments, recommended_model, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               ON CONFLICT (agent_type) DO UPDATE SET
                   category = EXCLUDED.category,
                   allowed_tools = EXCLUDED.allowed_tools,
                   forbidden_actions = EXCLUDED.forbidden_actions,
                   max_files = EXCLUDED.max_files,
                   wave_assignments = EXCLUDED.wave_assignments,
                   recommended_model = EXCLUDED.recommended_model
               RETURNING {COLUMNS}"#
        ))
        .bind(entry.id)
        .bind(&entry.agent_type)
        .bind(&entry.category)
        .bind(&entry.allowed_tools)
        .bind(&entry.forbidden_actions)
        .bind(entry.max_files)
        .bind(&entry.wave_assignments)
        .bind(&entry.recommended_model)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_by_type(&self, agent_type: &str) -> DomainResult<Option<AgentRegistryEntry>> {
        let row: Option<RegistryRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM agent_registry WHERE agent_type = $1"
        ))
        .bind(agent_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list(&self) -> DomainResult<Vec<AgentRegistryEntry>> {
        let rows: Vec<RegistryRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM agent_registry ORDER BY agent_type"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, agent_type: &str) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM agent_registry WHERE agent_type = $1")
            .bind(agent_type)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
